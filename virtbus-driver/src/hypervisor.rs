//! Hypervisor connection abstraction trait.
//!
//! Allows the bus service to run against the in-memory test driver or any
//! other connection driver without changing the dispatch logic.

use async_trait::async_trait;
use tokio::sync::mpsc;
use virtbus_core::{DomainState, DomainUuid, LifecycleEventKind, SchedulerType};

use crate::{DomainRef, DriverError};

/// Identifier of a lifecycle callback registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackId(pub u64);

/// A lifecycle callback as raised by the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainLifecycle {
    /// Connection-wide sequence number, strictly increasing per raise.
    pub seq: u64,
    /// Identity of the domain that changed.
    pub uuid: DomainUuid,
    /// Domain name at the time of the event.
    pub name: String,
    /// Running id at the time of the event, if any.
    pub id: Option<u32>,
    /// Top-level event.
    pub kind: LifecycleEventKind,
    /// Raw detail code.
    pub detail: i32,
}

/// Receiving end of a lifecycle callback registration.
pub type LifecycleStream = mpsc::UnboundedReceiver<DomainLifecycle>;

/// Hypervisor connection abstraction.
///
/// Implementations must be `Send + Sync` so one connection can be shared by
/// every bus request task. Domain operations take `flags`, an opaque bitmask
/// interpreted only by the driver.
#[async_trait]
pub trait Hypervisor: Send + Sync {
    /// URI this connection was opened with.
    fn uri(&self) -> &str;

    /// Enumerate all domains, active and inactive.
    ///
    /// # Errors
    /// Returns [`DriverError::Internal`] if the connection is unusable.
    async fn list_domains(&self) -> Result<Vec<DomainRef>, DriverError>;

    /// Look up a domain by name.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if no domain has that name.
    async fn lookup_by_name(&self, name: &str) -> Result<DomainRef, DriverError>;

    /// Look up a running domain by id.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if no running domain has that id.
    async fn lookup_by_id(&self, id: u32) -> Result<DomainRef, DriverError>;

    /// Look up a domain by UUID.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if no domain has that UUID.
    async fn lookup_by_uuid(&self, uuid: DomainUuid) -> Result<DomainRef, DriverError>;

    /// Current domain name.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if the reference is stale.
    async fn name(&self, dom: &DomainRef) -> Result<String, DriverError>;

    /// Running id, `None` while inactive.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if the reference is stale.
    async fn id(&self, dom: &DomainRef) -> Result<Option<u32>, DriverError>;

    /// Whether the domain is running.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if the reference is stale.
    async fn is_active(&self, dom: &DomainRef) -> Result<bool, DriverError>;

    /// Whether the domain has a stored definition.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if the reference is stale.
    async fn is_persistent(&self, dom: &DomainRef) -> Result<bool, DriverError>;

    /// Whether the domain starts with the host.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if the reference is stale.
    async fn autostart(&self, dom: &DomainRef) -> Result<bool, DriverError>;

    /// Toggle autostart.
    ///
    /// # Errors
    /// Returns [`DriverError::OperationInvalid`] for transient domains.
    async fn set_autostart(&self, dom: &DomainRef, autostart: bool) -> Result<(), DriverError>;

    /// Guest OS type, possibly empty.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if the reference is stale.
    async fn os_type(&self, dom: &DomainRef) -> Result<String, DriverError>;

    /// Scheduler name and parameter from a single query.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if the reference is stale.
    async fn scheduler_type(&self, dom: &DomainRef) -> Result<SchedulerType, DriverError>;

    /// Current state and its reason code.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if the reference is stale.
    async fn state(&self, dom: &DomainRef) -> Result<(DomainState, i32), DriverError>;

    /// XML configuration descriptor.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if the reference is stale.
    async fn xml_desc(&self, dom: &DomainRef, flags: u32) -> Result<String, DriverError>;

    /// Current or maximum vCPU count, per `flags`.
    ///
    /// # Errors
    /// Returns [`DriverError::OperationInvalid`] when live values are requested
    /// for an inactive domain.
    async fn vcpus(&self, dom: &DomainRef, flags: u32) -> Result<u32, DriverError>;

    /// Start an inactive domain.
    ///
    /// # Errors
    /// Returns [`DriverError::OperationInvalid`] if the domain is already running.
    async fn create(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError>;

    /// Forcefully stop a domain.
    ///
    /// # Errors
    /// Returns [`DriverError::NoSupport`] if the driver lacks this operation.
    async fn destroy(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError>;

    /// Request a graceful shutdown.
    ///
    /// # Errors
    /// Returns [`DriverError::OperationInvalid`] if the domain is not running.
    async fn shutdown(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError>;

    /// Request a reboot.
    ///
    /// # Errors
    /// Returns [`DriverError::OperationInvalid`] if the domain is not running.
    async fn reboot(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError>;

    /// Hard reset without a guest shutdown.
    ///
    /// # Errors
    /// Returns [`DriverError::NoSupport`] if the driver lacks this operation.
    async fn reset(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError>;

    /// Pause a running domain.
    ///
    /// # Errors
    /// Returns [`DriverError::OperationInvalid`] unless the domain is running.
    async fn suspend(&self, dom: &DomainRef) -> Result<(), DriverError>;

    /// Unpause a paused domain.
    ///
    /// # Errors
    /// Returns [`DriverError::OperationInvalid`] unless the domain is paused.
    async fn resume(&self, dom: &DomainRef) -> Result<(), DriverError>;

    /// Remove the stored definition; a running domain becomes transient.
    ///
    /// # Errors
    /// Returns [`DriverError::OperationInvalid`] for transient domains.
    async fn undefine(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError>;

    /// Save the running state to a managed image and stop the domain.
    ///
    /// # Errors
    /// Returns [`DriverError::OperationInvalid`] unless the domain is running
    /// and persistent.
    async fn managed_save(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError>;

    /// Discard the managed save image.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if the reference is stale.
    async fn managed_save_remove(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError>;

    /// Whether a managed save image exists.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if the reference is stale.
    async fn has_managed_save_image(&self, dom: &DomainRef, flags: u32)
        -> Result<bool, DriverError>;

    /// Register for lifecycle callbacks on every domain of this connection.
    ///
    /// # Errors
    /// Returns [`DriverError::Internal`] if the driver cannot deliver events.
    async fn subscribe_lifecycle(&self) -> Result<(CallbackId, LifecycleStream), DriverError>;

    /// Drop a lifecycle callback registration.
    ///
    /// # Errors
    /// Returns [`DriverError::CallbackNotRegistered`] for an unknown id.
    async fn unsubscribe_lifecycle(&self, id: CallbackId) -> Result<(), DriverError>;
}
