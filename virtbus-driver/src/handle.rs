//! Domain reference: a revocable pointer to a hypervisor domain.

use std::fmt;

use virtbus_core::DomainUuid;

/// A reference to a domain known to a hypervisor connection.
///
/// Holding a `DomainRef` does NOT keep the domain alive. Every call through
/// [`Hypervisor`](crate::Hypervisor) re-validates it and fails with
/// [`DriverError::NoDomain`](crate::DriverError::NoDomain) once the domain
/// has been undefined and stopped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct DomainRef {
    /// Immutable identity of the domain.
    pub uuid: DomainUuid,

    /// Name at resolution time.
    pub name: String,
}

impl DomainRef {
    /// Create a new domain reference.
    pub fn new(uuid: DomainUuid, name: impl Into<String>) -> Self {
        Self { uuid, name: name.into() }
    }
}

impl fmt::Display for DomainRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.uuid)
    }
}
