//! Domain directory: the path-resolution table.
//!
//! Maps domain UUIDs (and running ids) to the object path of their Domain
//! Object. Exactly one entry exists per live domain; retired domains keep a
//! last-known path so late events can still be addressed.

use std::{
    collections::HashMap,
    sync::RwLock,
};

use virtbus_core::{DomainUuid, ObjectPath};

#[derive(Debug, Default)]
struct Tables {
    by_uuid: HashMap<DomainUuid, ObjectPath>,
    by_path: HashMap<ObjectPath, DomainUuid>,
    by_id: HashMap<u32, DomainUuid>,
    last_known: HashMap<DomainUuid, ObjectPath>,
}

/// Thread-safe registry of exported Domain Objects.
#[derive(Debug, Default)]
pub struct DomainDirectory {
    tables: RwLock<Tables>,
}

impl DomainDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a Domain Object for `uuid` and return its path.
    ///
    /// Idempotent: a registered domain keeps its existing path.
    ///
    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    pub fn register(&self, uuid: DomainUuid) -> ObjectPath {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let mut tables = self.tables.write().expect("domain directory write lock poisoned");
        if let Some(path) = tables.by_uuid.get(&uuid) {
            return path.clone();
        }
        let path = ObjectPath::for_domain(uuid);
        tables.by_uuid.insert(uuid, path.clone());
        tables.by_path.insert(path.clone(), uuid);
        tables.last_known.insert(uuid, path.clone());
        tracing::debug!(uuid = %uuid, path = %path, "domain object exported");
        path
    }

    /// Record the running id of a domain; `None` clears it.
    ///
    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    pub fn note_id(&self, uuid: DomainUuid, id: Option<u32>) {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let mut tables = self.tables.write().expect("domain directory write lock poisoned");
        tables.by_id.retain(|_, owner| *owner != uuid);
        if let Some(id) = id {
            tables.by_id.insert(id, uuid);
        }
    }

    /// Path of a live Domain Object.
    ///
    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn resolve(&self, uuid: DomainUuid) -> Option<ObjectPath> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.tables
            .read()
            .expect("domain directory read lock poisoned")
            .by_uuid
            .get(&uuid)
            .cloned()
    }

    /// UUID of the running domain holding `id`.
    ///
    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn resolve_id(&self, id: u32) -> Option<DomainUuid> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.tables
            .read()
            .expect("domain directory read lock poisoned")
            .by_id
            .get(&id)
            .copied()
    }

    /// UUID of the live Domain Object exported at `path`.
    ///
    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn uuid_for_path(&self, path: &ObjectPath) -> Option<DomainUuid> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.tables
            .read()
            .expect("domain directory read lock poisoned")
            .by_path
            .get(path)
            .copied()
    }

    /// Last path a domain was exported at, live or retired.
    ///
    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn last_known(&self, uuid: DomainUuid) -> Option<ObjectPath> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.tables
            .read()
            .expect("domain directory read lock poisoned")
            .last_known
            .get(&uuid)
            .cloned()
    }

    /// Unexport a Domain Object. Returns `true` if it was live.
    ///
    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    pub fn retire(&self, uuid: DomainUuid) -> bool {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let mut tables = self.tables.write().expect("domain directory write lock poisoned");
        tables.by_id.retain(|_, owner| *owner != uuid);
        let Some(path) = tables.by_uuid.remove(&uuid) else {
            return false;
        };
        tables.by_path.remove(&path);
        tracing::debug!(uuid = %uuid, path = %path, "domain object retired");
        true
    }

    /// Number of live Domain Objects.
    ///
    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.tables.read().expect("domain directory read lock poisoned").by_uuid.len()
    }

    /// Whether no Domain Object is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
