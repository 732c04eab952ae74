//! Domain Object: the bus-side representative of one hypervisor domain.
//!
//! Property reads live in [`crate::properties`], lifecycle methods in
//! [`crate::dispatcher`].

use virtbus_core::{DomainUuid, ObjectPath};
use virtbus_driver::{DomainRef, Hypervisor};

use crate::{context::ServiceContext, error::BusFault};

/// One exported domain.
///
/// Holds only the domain's identity. The hypervisor handle is looked up
/// again on every call, so a domain undefined behind our back surfaces as
/// [`BusFault::NotFound`] instead of acting on a stale handle.
#[derive(Debug, Clone)]
pub struct DomainObject {
    ctx: ServiceContext,
    uuid: DomainUuid,
    path: ObjectPath,
}

impl DomainObject {
    /// The Domain Object exported at `path`.
    ///
    /// # Errors
    /// Returns [`BusFault::UnknownObject`] if nothing is exported there.
    pub fn at(ctx: &ServiceContext, path: &ObjectPath) -> Result<Self, BusFault> {
        let uuid = ctx
            .directory
            .uuid_for_path(path)
            .ok_or_else(|| BusFault::UnknownObject(path.to_string()))?;
        Ok(Self { ctx: ctx.clone(), uuid, path: path.clone() })
    }

    /// Export (or reuse) the Domain Object for `uuid`.
    #[must_use]
    pub fn export(ctx: &ServiceContext, uuid: DomainUuid) -> Self {
        let path = ctx.directory.register(uuid);
        Self { ctx: ctx.clone(), uuid, path }
    }

    #[must_use]
    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    #[must_use]
    pub fn uuid(&self) -> DomainUuid {
        self.uuid
    }

    pub(crate) fn hypervisor(&self) -> &dyn Hypervisor {
        self.ctx.hypervisor()
    }

    /// Fresh hypervisor handle for this domain.
    ///
    /// # Errors
    /// Returns [`BusFault::NotFound`] once the domain no longer exists.
    pub(crate) async fn handle(&self) -> Result<DomainRef, BusFault> {
        Ok(self.ctx.connection.lookup_by_uuid(self.uuid).await?)
    }
}
