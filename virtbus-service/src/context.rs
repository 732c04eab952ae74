//! Shared service state handed to every bus object.

use std::sync::Arc;

use virtbus_driver::{Connection, Hypervisor};

use crate::{directory::DomainDirectory, signal::SignalJournal};

/// The one hypervisor connection plus the tables built on top of it.
///
/// Cloning is cheap; every field is reference counted.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub connection: Arc<Connection>,
    pub directory: Arc<DomainDirectory>,
    pub signals: Arc<SignalJournal>,
}

impl ServiceContext {
    /// Build a context around `connection` with a signal journal holding at
    /// most `backlog` entries.
    #[must_use]
    pub fn new(connection: Connection, backlog: usize) -> Self {
        Self {
            connection: Arc::new(connection),
            directory: Arc::new(DomainDirectory::new()),
            signals: Arc::new(SignalJournal::new(backlog)),
        }
    }

    /// Shorthand for the wrapped hypervisor.
    #[must_use]
    pub fn hypervisor(&self) -> &dyn Hypervisor {
        self.connection.hypervisor()
    }
}
