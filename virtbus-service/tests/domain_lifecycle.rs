//! Integration test: domain lifecycle over the bus against `test:///default`.
//!
//! Each test builds a fresh service (connection, bridge, bus), drives the
//! default `test` domain through bus calls and checks both the resulting
//! properties and the `DomainEvent` signals the bridge emitted.

use std::{sync::Arc, time::Duration};

use virtbus_core::ObjectPath;
use virtbus_driver::{Connection, Operation, TestDriver};
use virtbus_service::{
    bridge::EventBridge,
    bus::{Bus, MethodCall},
    connect::ConnectObject,
    context::ServiceContext,
    error::BusFault,
    interface::{DOMAIN_INTERFACE, PROPERTIES_INTERFACE},
    signal::DomainEventSignal,
    value::Value,
};

const MISSING_FUNCTION: &str = "this function is not supported by the connection driver";

struct Harness {
    bus: Bus,
    bridge: EventBridge,
    path: ObjectPath,
}

impl Harness {
    async fn start(driver: TestDriver) -> Self {
        let ctx = ServiceContext::new(Connection::new(Arc::new(driver)), 256);
        let bridge = EventBridge::new(ctx.clone(), ctx.signals.clone());
        bridge.register().await.unwrap_or_else(|e| panic!("bridge registration failed: {e}"));
        let path = ConnectObject::new(ctx.clone())
            .lookup_by_name("test")
            .await
            .unwrap_or_else(|e| panic!("lookup of 'test' failed: {e}"));
        Self { bus: Bus::new(ctx), bridge, path }
    }

    async fn running() -> Self {
        Self::start(TestDriver::new_default()).await
    }

    async fn call(&self, member: &str, args: Vec<Value>) -> Result<Option<Value>, BusFault> {
        self.bus.call(&MethodCall::new(self.path.clone(), DOMAIN_INTERFACE, member, args)).await
    }

    async fn must(&self, member: &str, args: Vec<Value>) -> Option<Value> {
        self.call(member, args).await.unwrap_or_else(|e| panic!("{member} failed: {e}"))
    }

    async fn property(&self, name: &str) -> Value {
        let call = MethodCall::new(
            self.path.clone(),
            PROPERTIES_INTERFACE,
            "Get",
            vec![Value::from(DOMAIN_INTERFACE), Value::from(name)],
        );
        match self.bus.call(&call).await {
            Ok(Some(v)) => v,
            other => panic!("Get {name} returned {other:?}"),
        }
    }

    async fn state(&self) -> String {
        self.property("State").await.as_str().map(str::to_owned).unwrap_or_default()
    }

    /// Drain the bridge and return every signal emitted so far.
    async fn finish(self) -> Vec<DomainEventSignal> {
        self.bridge.unregister().await.unwrap_or_else(|e| panic!("bridge unregister failed: {e}"));
        self.bus.context().signals.since(0)
    }
}

fn events<'a>(signals: &'a [DomainEventSignal], path: &ObjectPath) -> Vec<&'a str> {
    signals.iter().filter(|s| &s.path == path).map(|s| s.event.as_str()).collect()
}

fn flags() -> Vec<Value> {
    vec![Value::U32(0)]
}

#[tokio::test]
async fn api_surface_round() {
    let h = Harness::start(TestDriver::new_default().without(Operation::Destroy)).await;

    let call = MethodCall::new(h.path.clone(), PROPERTIES_INTERFACE, "GetAll", vec![Value::from(DOMAIN_INTERFACE)]);
    let props = match h.bus.call(&call).await {
        Ok(Some(Value::Dict(props))) => props,
        other => panic!("GetAll returned {other:?}"),
    };
    let expected = [
        ("Active", "b"),
        ("Autostart", "b"),
        ("Id", "u"),
        ("Name", "s"),
        ("OSType", "s"),
        ("Persistent", "b"),
        ("SchedulerType", "(si)"),
        ("State", "s"),
        ("UUID", "s"),
    ];
    for (name, signature) in expected {
        let value = props.get(name).unwrap_or_else(|| panic!("GetAll lacks {name}"));
        assert_eq!(value.signature(), signature, "{name}");
    }

    assert!(matches!(h.must("GetXMLDesc", flags()).await, Some(Value::String(_))));
    assert!(matches!(h.must("GetVcpus", flags()).await, Some(Value::U32(_))));
    h.must("Reboot", flags()).await;
    h.must("Shutdown", flags()).await;
    h.must("Create", flags()).await;
    match h.call("Destroy", flags()).await {
        Err(e) => {
            assert_eq!(e.name(), "org.libvirt.Error.Unsupported");
            assert!(e.to_string().contains(MISSING_FUNCTION), "{e}");
        }
        Ok(reply) => panic!("Destroy must be unsupported, got {reply:?}"),
    }
    h.must("Undefine", flags()).await;
}

#[tokio::test]
async fn active_agrees_with_id_and_state() {
    let h = Harness::running().await;
    for step in [None, Some("Suspend"), Some("Resume")] {
        if let Some(member) = step {
            h.must(member, vec![]).await;
        }
        let active = h.property("Active").await.as_bool();
        let id = h.property("Id").await.as_u32();
        assert_eq!(active, Some(true));
        assert!(id.is_some_and(|id| id != u32::MAX));
    }
    h.must("Shutdown", flags()).await;
    assert_eq!(h.property("Active").await.as_bool(), Some(false));
    assert_eq!(h.property("Id").await.as_u32(), Some(u32::MAX));
}

#[tokio::test]
async fn autostart_set_then_get() {
    let h = Harness::running().await;
    let set = MethodCall::new(
        h.path.clone(),
        PROPERTIES_INTERFACE,
        "Set",
        vec![Value::from(DOMAIN_INTERFACE), Value::from("Autostart"), Value::Bool(true)],
    );
    h.bus.call(&set).await.unwrap_or_else(|e| panic!("Set failed: {e}"));
    assert_eq!(h.property("Autostart").await.as_bool(), Some(true));
}

#[tokio::test]
async fn managed_save_stops_domain_and_keeps_image() {
    let h = Harness::running().await;
    h.must("ManagedSave", flags()).await;
    assert!(matches!(h.must("HasManagedSaveImage", flags()).await, Some(Value::Bool(true))));
    assert_eq!(h.state().await, "shutoff");
    h.must("ManagedSaveRemove", flags()).await;
    assert!(matches!(h.must("HasManagedSaveImage", flags()).await, Some(Value::Bool(false))));

    let path = h.path.clone();
    let signals = h.finish().await;
    assert_eq!(events(&signals, &path), ["Stopped"]);
    assert_eq!(signals[0].detail_name.as_deref(), Some("Saved"));
}

#[tokio::test]
async fn suspend_emits_one_suspended() {
    let h = Harness::running().await;
    h.must("Suspend", vec![]).await;
    assert_eq!(h.state().await, "paused");
    let path = h.path.clone();
    assert_eq!(events(&h.finish().await, &path), ["Suspended"]);
}

#[tokio::test]
async fn resume_emits_one_resumed_after_suspend() {
    let h = Harness::running().await;
    h.must("Suspend", vec![]).await;
    h.must("Resume", vec![]).await;
    assert_eq!(h.state().await, "running");
    let path = h.path.clone();
    assert_eq!(events(&h.finish().await, &path), ["Suspended", "Resumed"]);
}

#[tokio::test]
async fn shutdown_emits_one_stopped() {
    let h = Harness::running().await;
    h.must("Shutdown", flags()).await;
    assert_eq!(h.state().await, "shutoff");
    let path = h.path.clone();
    let signals = h.finish().await;
    assert_eq!(events(&signals, &path), ["Stopped"]);
    assert_eq!(signals[0].detail_name.as_deref(), Some("Shutdown"));
}

#[tokio::test]
async fn undefine_after_shutdown_emits_one_undefined_and_retires() {
    let h = Harness::running().await;
    h.must("Shutdown", flags()).await;
    h.must("Undefine", flags()).await;
    let path = h.path.clone();
    let ctx = h.bus.context().clone();
    let signals = h.finish().await;
    assert_eq!(events(&signals, &path), ["Stopped", "Undefined"]);
    assert!(ctx.directory.is_empty(), "undefined domain must be retired");
    let bus = Bus::new(ctx);
    let call = MethodCall::new(path, DOMAIN_INTERFACE, "Create", flags());
    assert!(matches!(bus.call(&call).await, Err(BusFault::UnknownObject(_))));
}

#[tokio::test]
async fn uuid_is_stable_across_cycles() {
    let h = Harness::running().await;
    let before = h.property("UUID").await;
    for _ in 0..3 {
        h.must("Suspend", vec![]).await;
        h.must("Resume", vec![]).await;
    }
    assert_eq!(h.property("UUID").await, before);
}

#[tokio::test]
async fn long_sequence_has_no_duplicates_or_reordering() {
    let h = Harness::running().await;
    let mut expected = Vec::new();
    for _ in 0..10 {
        h.must("Suspend", vec![]).await;
        h.must("Resume", vec![]).await;
        expected.extend(["Suspended", "Resumed"]);
    }
    h.must("Shutdown", flags()).await;
    h.must("Create", flags()).await;
    expected.extend(["Stopped", "Started"]);

    let path = h.path.clone();
    let signals = h.finish().await;
    assert_eq!(events(&signals, &path), expected);
    assert!(signals.windows(2).all(|w| w[0].seq + 1 == w[1].seq), "sequence must be gapless");
}

#[tokio::test]
async fn signals_can_be_awaited_while_bridge_runs() {
    let h = Harness::running().await;
    let journal = Arc::clone(&h.bus.context().signals);
    let after = journal.last_seq();
    h.must("Suspend", vec![]).await;
    let got = journal.wait_since(after, Duration::from_secs(5)).await;
    assert_eq!(got.first().map(|s| s.event.as_str()), Some("Suspended"));
    assert_eq!(got[0].path, h.path);
    assert_eq!(got[0].body()[0], Value::ObjectPath(h.path.clone()));
}
