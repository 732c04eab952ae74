//! Signal emission: the `SignalSink` contract and the in-process journal.

use std::{collections::VecDeque, sync::Mutex, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use virtbus_core::{LifecycleEvent, LifecycleEventKind, ObjectPath, CONNECT_PATH};

use crate::error::BusFault;
use crate::interface::CONNECT_INTERFACE;
use crate::value::Value;

/// Member name of the lifecycle signal.
pub const DOMAIN_EVENT_SIGNAL: &str = "DomainEvent";

/// One emitted `DomainEvent` signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DomainEventSignal {
    /// Session-wide emission order, starting at 1.
    pub seq: u64,
    /// Object path of the domain the event concerns.
    pub path: ObjectPath,
    /// Top-level event name.
    pub event: LifecycleEventKind,
    /// Raw hypervisor detail code.
    pub detail: i32,
    /// Symbolic detail, when the code is known.
    pub detail_name: Option<String>,
    /// Wall-clock emission time.
    pub emitted_at: DateTime<Utc>,
}

impl DomainEventSignal {
    /// Object path the signal is emitted from.
    #[must_use]
    pub fn sender() -> &'static str {
        CONNECT_PATH
    }

    /// Interface the signal belongs to.
    #[must_use]
    pub fn interface() -> &'static str {
        CONNECT_INTERFACE
    }

    /// Signal body as sent on the bus: `(o path, s event)`.
    #[must_use]
    pub fn body(&self) -> Vec<Value> {
        vec![Value::ObjectPath(self.path.clone()), Value::from(self.event.as_str())]
    }
}

/// Destination for lifecycle signals.
///
/// Implementations must preserve call order: signals emitted by sequential
/// calls must reach subscribers in that order.
#[async_trait]
pub trait SignalSink: Send + Sync {
    /// Emit one `DomainEvent` signal and return its sequence number.
    ///
    /// # Errors
    /// Returns [`BusFault::Internal`] if the transport rejects the signal.
    async fn emit(&self, event: LifecycleEvent) -> Result<u64, BusFault>;
}

#[derive(Debug)]
struct JournalState {
    next_seq: u64,
    backlog: VecDeque<DomainEventSignal>,
    capacity: usize,
}

/// Ordered, bounded log of emitted signals with live fan-out.
///
/// Subscribers either poll with [`SignalJournal::since`] or wait for new
/// entries with [`SignalJournal::wait_since`].
#[derive(Debug)]
pub struct SignalJournal {
    state: Mutex<JournalState>,
    live: broadcast::Sender<DomainEventSignal>,
}

impl SignalJournal {
    /// Create a journal keeping at most `capacity` signals.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (live, _) = broadcast::channel(capacity);
        Self {
            state: Mutex::new(JournalState { next_seq: 1, backlog: VecDeque::with_capacity(capacity), capacity }),
            live,
        }
    }

    /// Append a signal, assigning the next sequence number.
    ///
    /// # Panics
    /// Panics if the internal `Mutex` is poisoned.
    pub fn record(&self, event: LifecycleEvent) -> DomainEventSignal {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let mut state = self.state.lock().expect("signal journal lock poisoned");
        let signal = DomainEventSignal {
            seq: state.next_seq,
            detail_name: event.detail_name().map(str::to_owned),
            path: event.path,
            event: event.kind,
            detail: event.detail,
            emitted_at: Utc::now(),
        };
        state.next_seq += 1;
        if state.backlog.len() == state.capacity {
            state.backlog.pop_front();
        }
        state.backlog.push_back(signal.clone());
        // Sent under the lock so live subscribers observe journal order.
        let _ = self.live.send(signal.clone());
        signal
    }

    /// Signals with a sequence number greater than `after`, oldest first.
    ///
    /// # Panics
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn since(&self, after: u64) -> Vec<DomainEventSignal> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let state = self.state.lock().expect("signal journal lock poisoned");
        state.backlog.iter().filter(|s| s.seq > after).cloned().collect()
    }

    /// Sequence number of the newest signal, `0` before the first emission.
    ///
    /// # Panics
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let state = self.state.lock().expect("signal journal lock poisoned");
        state.next_seq - 1
    }

    /// Subscribe to signals emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEventSignal> {
        self.live.subscribe()
    }

    /// Like [`since`](Self::since), but waits up to `timeout` for at least one
    /// signal when none is available yet.
    ///
    /// # Cancel Safety
    /// Cancel safe. Dropping the future only drops the live subscription.
    pub async fn wait_since(&self, after: u64, timeout: Duration) -> Vec<DomainEventSignal> {
        let mut rx = self.subscribe();
        let ready = self.since(after);
        if !ready.is_empty() {
            return ready;
        }
        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(signal) if signal.seq > after => return,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => return,
                    Err(broadcast::error::RecvError::Closed) => {
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        let _ = tokio::time::timeout(timeout, wait).await;
        self.since(after)
    }
}

#[async_trait]
impl SignalSink for SignalJournal {
    async fn emit(&self, event: LifecycleEvent) -> Result<u64, BusFault> {
        let signal = self.record(event);
        tracing::info!(
            seq = signal.seq,
            path = %signal.path,
            event = %signal.event,
            detail = signal.detail_name.as_deref().unwrap_or("unknown"),
            "DomainEvent emitted"
        );
        Ok(signal.seq)
    }
}
