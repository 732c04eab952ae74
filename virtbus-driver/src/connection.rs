//! Connection adapter wrapping a [`Hypervisor`].
//!
//! Provides domain resolution and enforces a single lifecycle callback
//! registration per connection.

use std::sync::Arc;

use tokio::sync::Mutex;
use virtbus_core::DomainUuid;

use crate::hypervisor::{CallbackId, Hypervisor, LifecycleStream};
use crate::test_driver::TestDriver;
use crate::{DomainRef, DriverError};

/// The process-wide hypervisor connection.
///
/// Wraps a [`Hypervisor`] and tracks the one lifecycle callback registration
/// the bus service holds. All operations are safe to call concurrently.
pub struct Connection {
    hypervisor: Arc<dyn Hypervisor>,
    callback: Mutex<Option<CallbackId>>,
}

impl Connection {
    /// Wrap an already opened hypervisor connection.
    #[must_use]
    pub fn new(hypervisor: Arc<dyn Hypervisor>) -> Self {
        Self { hypervisor, callback: Mutex::new(None) }
    }

    /// Open a connection by URI.
    ///
    /// # Errors
    /// Returns [`DriverError::ConnectionFailed`] if no bundled driver accepts `uri`.
    pub fn open(uri: &str) -> Result<Self, DriverError> {
        let driver = TestDriver::open(uri)?;
        tracing::info!(uri = %uri, "hypervisor connection opened");
        Ok(Self::new(Arc::new(driver)))
    }

    /// URI of the underlying connection.
    #[must_use]
    pub fn uri(&self) -> &str {
        self.hypervisor.uri()
    }

    /// The wrapped hypervisor, for per-domain operations.
    #[must_use]
    pub fn hypervisor(&self) -> &dyn Hypervisor {
        self.hypervisor.as_ref()
    }

    /// Enumerate every domain.
    ///
    /// # Errors
    /// Propagates errors from [`Hypervisor::list_domains`].
    pub async fn list_domains(&self) -> Result<Vec<DomainRef>, DriverError> {
        let domains = self.hypervisor.list_domains().await?;
        tracing::debug!(count = domains.len(), "enumerated domains");
        Ok(domains)
    }

    /// Resolve a domain by name.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if no domain has that name.
    pub async fn lookup_by_name(&self, name: &str) -> Result<DomainRef, DriverError> {
        self.hypervisor.lookup_by_name(name).await
    }

    /// Resolve a running domain by id.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if no running domain has that id.
    pub async fn lookup_by_id(&self, id: u32) -> Result<DomainRef, DriverError> {
        self.hypervisor.lookup_by_id(id).await
    }

    /// Resolve a domain by UUID.
    ///
    /// # Errors
    /// Returns [`DriverError::NoDomain`] if no domain has that UUID.
    pub async fn lookup_by_uuid(&self, uuid: DomainUuid) -> Result<DomainRef, DriverError> {
        self.hypervisor.lookup_by_uuid(uuid).await
    }

    /// Register the connection-wide lifecycle callback.
    ///
    /// # Errors
    /// Returns [`DriverError::CallbackAlreadyRegistered`] if a registration exists.
    /// Propagates errors from [`Hypervisor::subscribe_lifecycle`].
    pub async fn register_lifecycle(&self) -> Result<(CallbackId, LifecycleStream), DriverError> {
        let mut callback = self.callback.lock().await;
        if callback.is_some() {
            return Err(DriverError::CallbackAlreadyRegistered);
        }
        let (id, stream) = self.hypervisor.subscribe_lifecycle().await?;
        *callback = Some(id);
        tracing::info!(callback = id.0, uri = %self.uri(), "lifecycle callback registered");
        Ok((id, stream))
    }

    /// Remove the connection-wide lifecycle callback.
    ///
    /// # Errors
    /// Returns [`DriverError::CallbackNotRegistered`] if nothing is registered.
    /// Propagates errors from [`Hypervisor::unsubscribe_lifecycle`].
    pub async fn deregister_lifecycle(&self) -> Result<(), DriverError> {
        let mut callback = self.callback.lock().await;
        let id = callback.ok_or(DriverError::CallbackNotRegistered)?;
        self.hypervisor.unsubscribe_lifecycle(id).await?;
        *callback = None;
        tracing::info!(callback = id.0, "lifecycle callback deregistered");
        Ok(())
    }

    /// Whether the lifecycle callback is currently registered.
    pub async fn is_registered(&self) -> bool {
        self.callback.lock().await.is_some()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("uri", &self.uri()).finish_non_exhaustive()
    }
}
