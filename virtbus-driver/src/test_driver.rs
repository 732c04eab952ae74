//! In-memory test driver.
//!
//! Keeps every domain in process memory and raises lifecycle callbacks the
//! way a real connection would. `test:///default` starts with one running,
//! persistent domain named `test`; `test:///empty` starts with none.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use virtbus_core::event::detail;
use virtbus_core::{DomainState, DomainUuid, LifecycleEventKind, SchedulerType};

use crate::flags;
use crate::hypervisor::{CallbackId, DomainLifecycle, Hypervisor, LifecycleStream};
use crate::{DomainDefinition, DomainRef, DriverError};

/// URI of the populated test connection.
pub const DEFAULT_URI: &str = "test:///default";

/// URI of the empty test connection.
pub const EMPTY_URI: &str = "test:///empty";

/// UUID of the `test` domain on [`DEFAULT_URI`].
pub const DEFAULT_DOMAIN_UUID: &str = "6695eb01-f6a4-8304-79aa-97f2502e193f";

/// Name of the domain on [`DEFAULT_URI`].
pub const DEFAULT_DOMAIN_NAME: &str = "test";

/// State reason codes.
mod reason {
    pub const RUNNING_BOOTED: i32 = 1;
    pub const RUNNING_RESTORED: i32 = 3;
    pub const RUNNING_UNPAUSED: i32 = 5;
    pub const PAUSED_USER: i32 = 1;
    pub const SHUTOFF_UNKNOWN: i32 = 0;
    pub const SHUTOFF_SHUTDOWN: i32 = 1;
    pub const SHUTOFF_DESTROYED: i32 = 2;
    pub const SHUTOFF_SAVED: i32 = 5;
}

/// Domain operations that can be switched off to mimic a limited driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum Operation {
    Create,
    Destroy,
    Shutdown,
    Reboot,
    Reset,
    Suspend,
    Resume,
    Undefine,
    ManagedSave,
    ManagedSaveRemove,
}

impl Operation {
    /// Public API name reported in "not supported" errors.
    #[must_use]
    pub fn api_name(self) -> &'static str {
        match self {
            Self::Create => "virDomainCreateWithFlags",
            Self::Destroy => "virDomainDestroyFlags",
            Self::Shutdown => "virDomainShutdownFlags",
            Self::Reboot => "virDomainReboot",
            Self::Reset => "virDomainReset",
            Self::Suspend => "virDomainSuspend",
            Self::Resume => "virDomainResume",
            Self::Undefine => "virDomainUndefineFlags",
            Self::ManagedSave => "virDomainManagedSave",
            Self::ManagedSaveRemove => "virDomainManagedSaveRemove",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SavedImage {
    paused: bool,
}

#[derive(Debug)]
struct TestDomain {
    def: DomainDefinition,
    state: DomainState,
    reason: i32,
    id: Option<u32>,
    persistent: bool,
    autostart: bool,
    managed_save: Option<SavedImage>,
}

impl TestDomain {
    fn is_active(&self) -> bool {
        self.state.is_running_family()
    }

    fn to_ref(&self) -> DomainRef {
        DomainRef::new(self.def.uuid, self.def.name.clone())
    }
}

#[derive(Debug)]
struct TestState {
    domains: BTreeMap<DomainUuid, TestDomain>,
    next_id: u32,
    next_seq: u64,
    next_callback: u64,
    subscribers: BTreeMap<CallbackId, mpsc::UnboundedSender<DomainLifecycle>>,
    unsupported: BTreeSet<Operation>,
}

impl TestState {
    fn empty() -> Self {
        Self {
            domains: BTreeMap::new(),
            next_id: 1,
            next_seq: 1,
            next_callback: 1,
            subscribers: BTreeMap::new(),
            unsupported: BTreeSet::from([Operation::Reset]),
        }
    }

    fn ensure_supported(&self, op: Operation) -> Result<(), DriverError> {
        if self.unsupported.contains(&op) {
            return Err(DriverError::NoSupport { operation: op.api_name() });
        }
        Ok(())
    }

    fn domain(&self, dom: &DomainRef) -> Result<&TestDomain, DriverError> {
        self.domains
            .get(&dom.uuid)
            .ok_or_else(|| DriverError::NoDomain(format!("no domain with matching uuid '{}'", dom.uuid)))
    }

    fn domain_mut(&mut self, dom: &DomainRef) -> Result<&mut TestDomain, DriverError> {
        self.domains
            .get_mut(&dom.uuid)
            .ok_or_else(|| DriverError::NoDomain(format!("no domain with matching uuid '{}'", dom.uuid)))
    }

    fn active_domain_mut(&mut self, dom: &DomainRef) -> Result<&mut TestDomain, DriverError> {
        let d = self.domain_mut(dom)?;
        if !d.is_active() {
            return Err(DriverError::OperationInvalid(format!("domain '{}' is not running", d.def.name)));
        }
        Ok(d)
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Raise a lifecycle callback to every live subscriber.
    fn emit(&mut self, uuid: DomainUuid, kind: LifecycleEventKind, detail: i32) {
        let Some(d) = self.domains.get(&uuid) else {
            return;
        };
        let event = DomainLifecycle {
            seq: self.next_seq,
            uuid,
            name: d.def.name.clone(),
            id: d.id,
            kind,
            detail,
        };
        self.next_seq += 1;
        tracing::debug!(seq = event.seq, domain = %event.name, event = %kind, detail, "raising lifecycle event");
        self.subscribers.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    /// Move an active domain to shutoff; transient domains vanish afterwards.
    fn stop(&mut self, uuid: DomainUuid, shutoff_reason: i32, event_detail: i32) {
        let persistent = match self.domains.get_mut(&uuid) {
            Some(d) => {
                d.state = DomainState::Shutoff;
                d.reason = shutoff_reason;
                d.id = None;
                d.persistent
            }
            None => return,
        };
        // The callback reports the domain as it is after the stop.
        self.emit(uuid, LifecycleEventKind::Stopped, event_detail);
        if !persistent {
            self.domains.remove(&uuid);
        }
    }
}

/// In-memory hypervisor connection.
#[derive(Debug)]
pub struct TestDriver {
    uri: String,
    state: Mutex<TestState>,
}

impl TestDriver {
    /// Open one of the test URIs.
    ///
    /// # Errors
    /// Returns [`DriverError::ConnectionFailed`] for any other URI.
    pub fn open(uri: &str) -> Result<Self, DriverError> {
        match uri {
            DEFAULT_URI => Ok(Self::new_default()),
            EMPTY_URI => Ok(Self::empty()),
            other => Err(DriverError::ConnectionFailed {
                uri: other.to_owned(),
                reason: format!("only '{DEFAULT_URI}' and '{EMPTY_URI}' are available"),
            }),
        }
    }

    /// A connection with no domains.
    #[must_use]
    pub fn empty() -> Self {
        Self { uri: EMPTY_URI.to_owned(), state: Mutex::new(TestState::empty()) }
    }

    /// A connection holding the running `test` domain.
    #[must_use]
    pub fn new_default() -> Self {
        let mut state = TestState::empty();
        let uuid = match DomainUuid::parse(DEFAULT_DOMAIN_UUID) {
            Ok(u) => u,
            Err(_) => DomainUuid::new_v4(),
        };
        let mut def = DomainDefinition::new(DEFAULT_DOMAIN_NAME).with_uuid(uuid).with_vcpus(2, 2);
        def.memory_kib = 8_388_608;
        def.scheduler = SchedulerType::new("fair", 1);
        let id = state.alloc_id();
        state.domains.insert(
            uuid,
            TestDomain {
                def,
                state: DomainState::Running,
                reason: reason::RUNNING_BOOTED,
                id: Some(id),
                persistent: true,
                autostart: false,
                managed_save: None,
            },
        );
        Self { uri: DEFAULT_URI.to_owned(), state: Mutex::new(state) }
    }

    /// Make `op` fail with [`DriverError::NoSupport`].
    #[must_use]
    pub fn without(mut self, op: Operation) -> Self {
        self.state.get_mut().unsupported.insert(op);
        self
    }

    /// Make a previously unsupported `op` available.
    #[must_use]
    pub fn with(mut self, op: Operation) -> Self {
        self.state.get_mut().unsupported.remove(&op);
        self
    }

    /// Store a persistent definition, adding or updating a domain.
    ///
    /// # Errors
    /// Returns [`DriverError::OperationInvalid`] if another domain already
    /// uses the name.
    pub async fn define(&self, def: DomainDefinition) -> Result<DomainRef, DriverError> {
        let mut state = self.state.lock().await;
        if let Some(clash) = state.domains.values().find(|d| d.def.name == def.name && d.def.uuid != def.uuid) {
            return Err(DriverError::OperationInvalid(format!(
                "domain '{}' already exists with uuid {}",
                def.name, clash.def.uuid
            )));
        }
        let uuid = def.uuid;
        let detail = if let Some(existing) = state.domains.get_mut(&uuid) {
            existing.def = def;
            existing.persistent = true;
            detail::DEFINED_UPDATED
        } else {
            state.domains.insert(
                uuid,
                TestDomain {
                    def,
                    state: DomainState::Shutoff,
                    reason: reason::SHUTOFF_UNKNOWN,
                    id: None,
                    persistent: true,
                    autostart: false,
                    managed_save: None,
                },
            );
            detail::DEFINED_ADDED
        };
        state.emit(uuid, LifecycleEventKind::Defined, detail);
        state.domain(&DomainRef::new(uuid, "")).map(TestDomain::to_ref)
    }

    /// Start a domain without storing its definition.
    ///
    /// # Errors
    /// Returns [`DriverError::OperationInvalid`] if the name or UUID is taken.
    pub async fn create_transient(&self, def: DomainDefinition) -> Result<DomainRef, DriverError> {
        let mut state = self.state.lock().await;
        if state.domains.values().any(|d| d.def.name == def.name || d.def.uuid == def.uuid) {
            return Err(DriverError::OperationInvalid(format!("domain '{}' already exists", def.name)));
        }
        let id = state.alloc_id();
        let dom = DomainRef::new(def.uuid, def.name.clone());
        state.domains.insert(
            def.uuid,
            TestDomain {
                def,
                state: DomainState::Running,
                reason: reason::RUNNING_BOOTED,
                id: Some(id),
                persistent: false,
                autostart: false,
                managed_save: None,
            },
        );
        state.emit(dom.uuid, LifecycleEventKind::Started, detail::STARTED_BOOTED);
        Ok(dom)
    }

    /// Number of live lifecycle subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        self.state.lock().await.subscribers.len()
    }
}

#[async_trait]
impl Hypervisor for TestDriver {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn list_domains(&self) -> Result<Vec<DomainRef>, DriverError> {
        let state = self.state.lock().await;
        Ok(state.domains.values().map(TestDomain::to_ref).collect())
    }

    async fn lookup_by_name(&self, name: &str) -> Result<DomainRef, DriverError> {
        let state = self.state.lock().await;
        state
            .domains
            .values()
            .find(|d| d.def.name == name)
            .map(TestDomain::to_ref)
            .ok_or_else(|| DriverError::NoDomain(format!("no domain with matching name '{name}'")))
    }

    async fn lookup_by_id(&self, id: u32) -> Result<DomainRef, DriverError> {
        let state = self.state.lock().await;
        state
            .domains
            .values()
            .find(|d| d.id == Some(id))
            .map(TestDomain::to_ref)
            .ok_or_else(|| DriverError::NoDomain(format!("no domain with matching id {id}")))
    }

    async fn lookup_by_uuid(&self, uuid: DomainUuid) -> Result<DomainRef, DriverError> {
        let state = self.state.lock().await;
        state
            .domains
            .get(&uuid)
            .map(TestDomain::to_ref)
            .ok_or_else(|| DriverError::NoDomain(format!("no domain with matching uuid '{uuid}'")))
    }

    async fn name(&self, dom: &DomainRef) -> Result<String, DriverError> {
        Ok(self.state.lock().await.domain(dom)?.def.name.clone())
    }

    async fn id(&self, dom: &DomainRef) -> Result<Option<u32>, DriverError> {
        Ok(self.state.lock().await.domain(dom)?.id)
    }

    async fn is_active(&self, dom: &DomainRef) -> Result<bool, DriverError> {
        Ok(self.state.lock().await.domain(dom)?.is_active())
    }

    async fn is_persistent(&self, dom: &DomainRef) -> Result<bool, DriverError> {
        Ok(self.state.lock().await.domain(dom)?.persistent)
    }

    async fn autostart(&self, dom: &DomainRef) -> Result<bool, DriverError> {
        Ok(self.state.lock().await.domain(dom)?.autostart)
    }

    async fn set_autostart(&self, dom: &DomainRef, autostart: bool) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        let d = state.domain_mut(dom)?;
        if !d.persistent {
            return Err(DriverError::OperationInvalid(
                "cannot set autostart for transient domain".to_owned(),
            ));
        }
        d.autostart = autostart;
        Ok(())
    }

    async fn os_type(&self, dom: &DomainRef) -> Result<String, DriverError> {
        Ok(self.state.lock().await.domain(dom)?.def.os_type.clone())
    }

    async fn scheduler_type(&self, dom: &DomainRef) -> Result<SchedulerType, DriverError> {
        Ok(self.state.lock().await.domain(dom)?.def.scheduler.clone())
    }

    async fn state(&self, dom: &DomainRef) -> Result<(DomainState, i32), DriverError> {
        let state = self.state.lock().await;
        let d = state.domain(dom)?;
        Ok((d.state, d.reason))
    }

    async fn xml_desc(&self, dom: &DomainRef, flags: u32) -> Result<String, DriverError> {
        flags::check(flags, flags::xml::ALL)?;
        let state = self.state.lock().await;
        let d = state.domain(dom)?;
        let id = if flags & flags::xml::INACTIVE == 0 { d.id } else { None };
        Ok(d.def.to_xml(id))
    }

    async fn vcpus(&self, dom: &DomainRef, flags: u32) -> Result<u32, DriverError> {
        flags::check(flags, flags::vcpu::ALL)?;
        let both = flags::vcpu::AFFECT_LIVE | flags::vcpu::AFFECT_CONFIG;
        if flags & both == both {
            return Err(DriverError::InvalidArg(
                "flags 'affect live' and 'affect config' are mutually exclusive".to_owned(),
            ));
        }
        let state = self.state.lock().await;
        let d = state.domain(dom)?;
        if flags & flags::vcpu::AFFECT_LIVE != 0 && !d.is_active() {
            return Err(DriverError::OperationInvalid(format!("domain '{}' is not running", d.def.name)));
        }
        if flags & flags::vcpu::MAXIMUM != 0 {
            Ok(d.def.max_vcpus)
        } else {
            Ok(d.def.vcpus)
        }
    }

    async fn create(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError> {
        flags::check(flags, flags::create::ALL)?;
        let mut state = self.state.lock().await;
        state.ensure_supported(Operation::Create)?;
        if state.domain(dom)?.is_active() {
            return Err(DriverError::OperationInvalid("domain is already running".to_owned()));
        }
        let id = state.alloc_id();
        let d = state.domain_mut(dom)?;
        let image = d.managed_save.take();
        let restored = image.filter(|_| flags & flags::create::FORCE_BOOT == 0);
        d.state = DomainState::Running;
        d.reason = if restored.is_some() { reason::RUNNING_RESTORED } else { reason::RUNNING_BOOTED };
        d.id = Some(id);
        let start_paused =
            flags & flags::create::START_PAUSED != 0 || restored.is_some_and(|img| img.paused);
        let started = if restored.is_some() { detail::STARTED_RESTORED } else { detail::STARTED_BOOTED };
        state.emit(dom.uuid, LifecycleEventKind::Started, started);
        if start_paused {
            let d = state.domain_mut(dom)?;
            d.state = DomainState::Paused;
            d.reason = reason::PAUSED_USER;
            state.emit(dom.uuid, LifecycleEventKind::Suspended, detail::SUSPENDED_PAUSED);
        }
        Ok(())
    }

    async fn destroy(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        state.ensure_supported(Operation::Destroy)?;
        flags::check(flags, flags::destroy::ALL)?;
        state.active_domain_mut(dom)?;
        state.stop(dom.uuid, reason::SHUTOFF_DESTROYED, detail::STOPPED_DESTROYED);
        Ok(())
    }

    async fn shutdown(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        state.ensure_supported(Operation::Shutdown)?;
        flags::check(flags, flags::power::ALL)?;
        state.active_domain_mut(dom)?;
        state.stop(dom.uuid, reason::SHUTOFF_SHUTDOWN, detail::STOPPED_SHUTDOWN);
        Ok(())
    }

    async fn reboot(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        state.ensure_supported(Operation::Reboot)?;
        flags::check(flags, flags::power::ALL)?;
        let d = state.active_domain_mut(dom)?;
        d.state = DomainState::Running;
        d.reason = reason::RUNNING_BOOTED;
        Ok(())
    }

    async fn reset(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        state.ensure_supported(Operation::Reset)?;
        flags::check(flags, 0)?;
        state.active_domain_mut(dom)?;
        Ok(())
    }

    async fn suspend(&self, dom: &DomainRef) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        state.ensure_supported(Operation::Suspend)?;
        let d = state.domain_mut(dom)?;
        if d.state != DomainState::Running {
            return Err(DriverError::OperationInvalid(format!("domain '{}' not running", d.def.name)));
        }
        d.state = DomainState::Paused;
        d.reason = reason::PAUSED_USER;
        state.emit(dom.uuid, LifecycleEventKind::Suspended, detail::SUSPENDED_PAUSED);
        Ok(())
    }

    async fn resume(&self, dom: &DomainRef) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        state.ensure_supported(Operation::Resume)?;
        let d = state.domain_mut(dom)?;
        if d.state != DomainState::Paused {
            return Err(DriverError::OperationInvalid(format!("domain '{}' not paused", d.def.name)));
        }
        d.state = DomainState::Running;
        d.reason = reason::RUNNING_UNPAUSED;
        state.emit(dom.uuid, LifecycleEventKind::Resumed, detail::RESUMED_UNPAUSED);
        Ok(())
    }

    async fn undefine(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        state.ensure_supported(Operation::Undefine)?;
        flags::check(flags, flags::undefine::ALL)?;
        let d = state.domain_mut(dom)?;
        if !d.persistent {
            return Err(DriverError::OperationInvalid("cannot undefine transient domain".to_owned()));
        }
        if d.managed_save.is_some() {
            if flags & flags::undefine::MANAGED_SAVE == 0 {
                return Err(DriverError::OperationInvalid(
                    "Refusing to undefine while domain managed save image exists".to_owned(),
                ));
            }
            d.managed_save = None;
        }
        let active = d.is_active();
        state.emit(dom.uuid, LifecycleEventKind::Undefined, detail::UNDEFINED_REMOVED);
        if active {
            if let Some(d) = state.domains.get_mut(&dom.uuid) {
                d.persistent = false;
                d.autostart = false;
            }
        } else {
            state.domains.remove(&dom.uuid);
        }
        Ok(())
    }

    async fn managed_save(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        state.ensure_supported(Operation::ManagedSave)?;
        flags::check(flags, flags::save::ALL)?;
        let d = state.active_domain_mut(dom)?;
        if !d.persistent {
            return Err(DriverError::OperationInvalid(
                "cannot do managed save for transient domain".to_owned(),
            ));
        }
        let paused = flags & flags::save::PAUSED != 0
            || (d.state == DomainState::Paused && flags & flags::save::RUNNING == 0);
        d.managed_save = Some(SavedImage { paused });
        state.stop(dom.uuid, reason::SHUTOFF_SAVED, detail::STOPPED_SAVED);
        Ok(())
    }

    async fn managed_save_remove(&self, dom: &DomainRef, flags: u32) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        state.ensure_supported(Operation::ManagedSaveRemove)?;
        flags::check(flags, 0)?;
        state.domain_mut(dom)?.managed_save = None;
        Ok(())
    }

    async fn has_managed_save_image(
        &self,
        dom: &DomainRef,
        flags: u32,
    ) -> Result<bool, DriverError> {
        flags::check(flags, 0)?;
        Ok(self.state.lock().await.domain(dom)?.managed_save.is_some())
    }

    async fn subscribe_lifecycle(&self) -> Result<(CallbackId, LifecycleStream), DriverError> {
        let mut state = self.state.lock().await;
        let id = CallbackId(state.next_callback);
        state.next_callback += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.insert(id, tx);
        tracing::debug!(callback = id.0, "lifecycle callback registered");
        Ok((id, rx))
    }

    async fn unsubscribe_lifecycle(&self, id: CallbackId) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        if state.subscribers.remove(&id).is_none() {
            return Err(DriverError::CallbackNotRegistered);
        }
        tracing::debug!(callback = id.0, "lifecycle callback removed");
        Ok(())
    }
}
