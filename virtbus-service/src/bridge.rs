//! Event bridge: hypervisor lifecycle callbacks in, `DomainEvent` signals out.
//!
//! One callback registration serves every domain. A single task drains it,
//! so signals leave in exactly the order the hypervisor raised them.

use std::sync::Arc;

use tokio::{sync::Mutex, task::JoinHandle};
use virtbus_core::{LifecycleEvent, LifecycleEventKind, ObjectPath};
use virtbus_driver::{CallbackId, DomainLifecycle, DriverError, LifecycleStream};

use crate::{context::ServiceContext, error::BusFault, signal::SignalSink};

#[derive(Debug)]
enum BridgeState {
    Unregistered,
    Active { callback: CallbackId, task: JoinHandle<()> },
}

/// Forwards lifecycle callbacks to a [`SignalSink`].
pub struct EventBridge {
    ctx: ServiceContext,
    sink: Arc<dyn SignalSink>,
    state: Mutex<BridgeState>,
}

impl EventBridge {
    #[must_use]
    pub fn new(ctx: ServiceContext, sink: Arc<dyn SignalSink>) -> Self {
        Self { ctx, sink, state: Mutex::new(BridgeState::Unregistered) }
    }

    /// Register the connection-wide lifecycle callback and start delivering.
    ///
    /// # Errors
    /// Returns [`BusFault::InvalidState`] if the bridge is already active.
    pub async fn register(&self) -> Result<(), BusFault> {
        let mut state = self.state.lock().await;
        if matches!(*state, BridgeState::Active { .. }) {
            return Err(BusFault::InvalidState("event bridge is already registered".to_owned()));
        }
        let (callback, stream) = self.ctx.connection.register_lifecycle().await?;
        let task = tokio::spawn(run(self.ctx.clone(), Arc::clone(&self.sink), stream));
        *state = BridgeState::Active { callback, task };
        tracing::info!(callback = callback.0, "event bridge active");
        Ok(())
    }

    /// Drop the callback registration and wait for queued callbacks to drain.
    ///
    /// # Errors
    /// Returns [`BusFault::InvalidState`] if the bridge is not active.
    pub async fn unregister(&self) -> Result<(), BusFault> {
        let mut state = self.state.lock().await;
        let BridgeState::Active { callback, .. } = &*state else {
            return Err(BusFault::InvalidState("event bridge is not registered".to_owned()));
        };
        let callback = *callback;
        self.ctx.connection.deregister_lifecycle().await?;
        if let BridgeState::Active { task, .. } = std::mem::replace(&mut *state, BridgeState::Unregistered) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "event bridge task ended abnormally");
            }
        }
        tracing::info!(callback = callback.0, "event bridge stopped");
        Ok(())
    }

    pub async fn is_active(&self) -> bool {
        matches!(*self.state.lock().await, BridgeState::Active { .. })
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge").field("ctx", &self.ctx).finish_non_exhaustive()
    }
}

async fn run(ctx: ServiceContext, sink: Arc<dyn SignalSink>, mut stream: LifecycleStream) {
    let mut last_seq = 0;
    while let Some(callback) = stream.recv().await {
        if callback.seq <= last_seq {
            tracing::debug!(seq = callback.seq, last_seq, "dropping redelivered lifecycle callback");
            continue;
        }
        last_seq = callback.seq;
        deliver(&ctx, sink.as_ref(), callback).await;
    }
    tracing::debug!(last_seq, "lifecycle stream closed");
}

async fn deliver(ctx: &ServiceContext, sink: &dyn SignalSink, callback: DomainLifecycle) {
    let uuid = callback.uuid;
    let path = resolve(ctx, &callback).await;
    let event = LifecycleEvent::new(path, callback.kind, callback.detail);
    if let Err(e) = sink.emit(event).await {
        tracing::warn!(uuid = %uuid, event = %callback.kind, error = %e, "failed to emit DomainEvent");
    }

    if matches!(callback.kind, LifecycleEventKind::Undefined | LifecycleEventKind::Stopped) {
        match ctx.connection.lookup_by_uuid(uuid).await {
            Ok(_) => {}
            Err(DriverError::NoDomain(_)) => {
                if ctx.directory.retire(uuid) {
                    tracing::info!(uuid = %uuid, name = %callback.name, "domain object retired");
                }
            }
            Err(e) => tracing::warn!(uuid = %uuid, error = %e, "could not re-resolve domain"),
        }
    }
}

/// Path for the domain a callback concerns.
///
/// Live objects keep their path. A domain seen for the first time is
/// exported if it still exists; otherwise the last-known or UUID-derived path
/// is used so the event is never dropped.
async fn resolve(ctx: &ServiceContext, callback: &DomainLifecycle) -> ObjectPath {
    let uuid = callback.uuid;
    if let Some(path) = ctx.directory.resolve(uuid) {
        ctx.directory.note_id(uuid, callback.id);
        return path;
    }
    match ctx.connection.lookup_by_uuid(uuid).await {
        Ok(_) => {
            let path = ctx.directory.register(uuid);
            ctx.directory.note_id(uuid, callback.id);
            path
        }
        Err(e) => {
            tracing::debug!(uuid = %uuid, error = %e, "domain gone before delivery, using last known path");
            ctx.directory.last_known(uuid).unwrap_or_else(|| ObjectPath::for_domain(uuid))
        }
    }
}
