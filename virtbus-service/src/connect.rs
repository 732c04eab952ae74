//! The `org.libvirt.Connect` object: enumeration and lookups.
//!
//! Every domain returned here is exported in the directory first, so the
//! reply path is immediately callable.

use virtbus_core::{DomainUuid, ObjectPath};
use virtbus_driver::{flags, DomainRef, DriverError};

use crate::{context::ServiceContext, dispatcher::signature_of, error::BusFault, value::Value};

/// Methods of `org.libvirt.Connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectMethod {
    ListDomains,
    DomainLookupByName,
    DomainLookupById,
    DomainLookupByUuid,
}

/// Bus object at `/org/libvirt/Connect`.
#[derive(Debug, Clone)]
pub struct ConnectObject {
    ctx: ServiceContext,
}

impl ConnectObject {
    #[must_use]
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Paths of every domain matching `flags`, exporting each one.
    ///
    /// Within each of the active/inactive and persistent/transient pairs,
    /// setting neither bit means "either".
    ///
    /// # Errors
    /// Returns [`BusFault::InvalidArgs`] for unknown flag bits, and
    /// [`BusFault::NotFound`] if a domain vanishes while being filtered.
    pub async fn list_domains(&self, flags: u32) -> Result<Vec<ObjectPath>, BusFault> {
        flags::check(flags, flags::list::ALL)?;
        let hv = self.ctx.hypervisor();
        let mut paths = Vec::new();
        for dom in self.ctx.connection.list_domains().await? {
            if flags != 0 {
                let active = hv.is_active(&dom).await?;
                let persistent = hv.is_persistent(&dom).await?;
                if !selected(flags, flags::list::ACTIVE, flags::list::INACTIVE, active)
                    || !selected(flags, flags::list::PERSISTENT, flags::list::TRANSIENT, persistent)
                {
                    continue;
                }
            }
            paths.push(self.export(&dom).await?);
        }
        Ok(paths)
    }

    /// # Errors
    /// Returns [`BusFault::NotFound`] if no domain has that name.
    pub async fn lookup_by_name(&self, name: &str) -> Result<ObjectPath, BusFault> {
        let dom = self.ctx.connection.lookup_by_name(name).await?;
        self.export(&dom).await
    }

    /// Resolve a running id, trying the directory's id index before asking
    /// the hypervisor to search.
    ///
    /// # Errors
    /// Returns [`BusFault::NotFound`] if no running domain has that id.
    pub async fn lookup_by_id(&self, id: u32) -> Result<ObjectPath, BusFault> {
        if let Some(path) = self.indexed(id).await? {
            return Ok(path);
        }
        let dom = self.ctx.connection.lookup_by_id(id).await?;
        self.export(&dom).await
    }

    /// Path of the exported domain the index maps `id` to, confirmed
    /// against the hypervisor. Stale entries are dropped.
    async fn indexed(&self, id: u32) -> Result<Option<ObjectPath>, BusFault> {
        let Some(uuid) = self.ctx.directory.resolve_id(id) else {
            return Ok(None);
        };
        let current = match self.ctx.connection.lookup_by_uuid(uuid).await {
            Ok(dom) => self.ctx.hypervisor().id(&dom).await,
            Err(e) => Err(e),
        };
        match current {
            Ok(Some(current)) if current == id => Ok(self.ctx.directory.resolve(uuid)),
            Ok(current) => {
                self.ctx.directory.note_id(uuid, current);
                Ok(None)
            }
            Err(DriverError::NoDomain(_)) => {
                self.ctx.directory.note_id(uuid, None);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    /// Returns [`BusFault::InvalidArgs`] if `uuid` does not parse, and
    /// [`BusFault::NotFound`] if no domain has it.
    pub async fn lookup_by_uuid(&self, uuid: &str) -> Result<ObjectPath, BusFault> {
        let uuid = DomainUuid::parse(uuid).map_err(|e| BusFault::InvalidArgs(e.to_string()))?;
        let dom = self.ctx.connection.lookup_by_uuid(uuid).await?;
        self.export(&dom).await
    }

    /// Run `method` with bus arguments.
    ///
    /// # Errors
    /// Returns [`BusFault::InvalidArgs`] if `args` do not match the method,
    /// otherwise whatever the method itself returns.
    pub async fn invoke(&self, method: ConnectMethod, args: &[Value]) -> Result<Value, BusFault> {
        let reply = match (method, args) {
            (ConnectMethod::ListDomains, [Value::U32(flags)]) => Value::from(self.list_domains(*flags).await?),
            (ConnectMethod::DomainLookupByName, [Value::String(name)]) => {
                Value::from(self.lookup_by_name(name).await?)
            }
            (ConnectMethod::DomainLookupById, [Value::U32(id)]) => Value::from(self.lookup_by_id(*id).await?),
            (ConnectMethod::DomainLookupByUuid, [Value::String(uuid)]) => {
                Value::from(self.lookup_by_uuid(uuid).await?)
            }
            (method, args) => {
                return Err(BusFault::InvalidArgs(format!(
                    "{method:?} does not accept '{}'",
                    signature_of(args)
                )))
            }
        };
        Ok(reply)
    }

    /// Register `dom`, then confirm it still exists. A domain undefined in
    /// between is retired again so no object outlives it.
    async fn export(&self, dom: &DomainRef) -> Result<ObjectPath, BusFault> {
        let path = self.ctx.directory.register(dom.uuid);
        match self.ctx.hypervisor().id(dom).await {
            Ok(id) => {
                self.ctx.directory.note_id(dom.uuid, id);
                Ok(path)
            }
            Err(e) => {
                if matches!(e, DriverError::NoDomain(_)) && self.ctx.directory.retire(dom.uuid) {
                    tracing::debug!(uuid = %dom.uuid, "domain vanished during export");
                }
                Err(e.into())
            }
        }
    }
}

fn selected(flags: u32, yes: u32, no: u32, value: bool) -> bool {
    if flags & (yes | no) == 0 {
        return true;
    }
    (value && flags & yes != 0) || (!value && flags & no != 0)
}
