//! Integration test: the test driver seen through a `Connection`.
//!
//! Covers the invariants the bus layer relies on: lifecycle callbacks are
//! raised once per transition in call order, `Active` agrees with the id and
//! run state, and domains disappear only once undefined and stopped.

use std::sync::Arc;

use proptest::prelude::*;
use virtbus_core::{DomainId, LifecycleEventKind};
use virtbus_driver::{
    flags, test_driver::DEFAULT_DOMAIN_NAME, Connection, DomainDefinition, DomainLifecycle, DomainRef,
    DriverError, Hypervisor, LifecycleStream, TestDriver,
};

fn connect(driver: TestDriver) -> (Connection, Arc<TestDriver>) {
    let driver = Arc::new(driver);
    (Connection::new(driver.clone()), driver)
}

fn drain(rx: &mut LifecycleStream) -> Vec<DomainLifecycle> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn kinds(events: &[DomainLifecycle]) -> Vec<&'static str> {
    events.iter().map(|e| e.kind.as_str()).collect()
}

#[tokio::test]
async fn managed_save_of_paused_domain_restores_paused() {
    let (conn, _) = connect(TestDriver::new_default());
    let (_, mut rx) = conn.register_lifecycle().await.unwrap_or_else(|e| panic!("register failed: {e}"));
    let dom = conn.lookup_by_name(DEFAULT_DOMAIN_NAME).await.unwrap_or_else(|e| panic!("lookup failed: {e}"));
    let hv = conn.hypervisor();

    hv.suspend(&dom).await.unwrap_or_else(|e| panic!("suspend failed: {e}"));
    hv.managed_save(&dom, 0).await.unwrap_or_else(|e| panic!("managed save failed: {e}"));
    assert!(matches!(hv.has_managed_save_image(&dom, 0).await, Ok(true)));
    hv.create(&dom, 0).await.unwrap_or_else(|e| panic!("create failed: {e}"));

    let events = drain(&mut rx);
    assert_eq!(kinds(&events), ["Suspended", "Stopped", "Started", "Suspended"]);
    assert_eq!(events[1].kind.detail_name(events[1].detail), Some("Saved"));
    assert_eq!(events[2].kind.detail_name(events[2].detail), Some("Restored"));
    assert!(matches!(hv.has_managed_save_image(&dom, 0).await, Ok(false)), "image is consumed");
}

#[tokio::test]
async fn force_boot_discards_saved_state() {
    let (conn, _) = connect(TestDriver::new_default());
    let dom = conn.lookup_by_name(DEFAULT_DOMAIN_NAME).await.unwrap_or_else(|e| panic!("lookup failed: {e}"));
    let hv = conn.hypervisor();
    hv.managed_save(&dom, 0).await.unwrap_or_else(|e| panic!("managed save failed: {e}"));
    let (_, mut rx) = conn.register_lifecycle().await.unwrap_or_else(|e| panic!("register failed: {e}"));
    hv.create(&dom, flags::create::FORCE_BOOT).await.unwrap_or_else(|e| panic!("create failed: {e}"));
    let events = drain(&mut rx);
    assert_eq!(kinds(&events), ["Started"]);
    assert_eq!(events[0].kind.detail_name(events[0].detail), Some("Booted"));
}

#[tokio::test]
async fn undefine_with_managed_save_needs_flag() {
    let (conn, _) = connect(TestDriver::new_default());
    let dom = conn.lookup_by_name(DEFAULT_DOMAIN_NAME).await.unwrap_or_else(|e| panic!("lookup failed: {e}"));
    let hv = conn.hypervisor();
    hv.managed_save(&dom, 0).await.unwrap_or_else(|e| panic!("managed save failed: {e}"));
    assert!(matches!(hv.undefine(&dom, 0).await, Err(DriverError::OperationInvalid(_))));
    hv.undefine(&dom, flags::undefine::MANAGED_SAVE).await.unwrap_or_else(|e| panic!("undefine failed: {e}"));
    assert!(matches!(conn.lookup_by_uuid(dom.uuid).await, Err(DriverError::NoDomain(_))));
}

#[tokio::test]
async fn transient_domain_lives_until_stopped() {
    let (conn, driver) = connect(TestDriver::empty());
    let (_, mut rx) = conn.register_lifecycle().await.unwrap_or_else(|e| panic!("register failed: {e}"));
    let dom = driver
        .create_transient(DomainDefinition::new("scratch"))
        .await
        .unwrap_or_else(|e| panic!("create_transient failed: {e}"));
    let hv = conn.hypervisor();
    assert!(matches!(hv.is_persistent(&dom).await, Ok(false)));
    assert!(matches!(hv.set_autostart(&dom, true).await, Err(DriverError::OperationInvalid(_))));
    assert!(matches!(hv.undefine(&dom, 0).await, Err(DriverError::OperationInvalid(_))));
    hv.shutdown(&dom, 0).await.unwrap_or_else(|e| panic!("shutdown failed: {e}"));
    assert!(matches!(hv.name(&dom).await, Err(DriverError::NoDomain(_))));
    assert_eq!(kinds(&drain(&mut rx)), ["Started", "Stopped"]);
}

#[tokio::test]
async fn every_subscriber_sees_every_event() {
    let (_, driver) = connect(TestDriver::new_default());
    let dom = driver.lookup_by_name(DEFAULT_DOMAIN_NAME).await.unwrap_or_else(|e| panic!("lookup failed: {e}"));
    let (_, mut a) = driver.subscribe_lifecycle().await.unwrap_or_else(|e| panic!("subscribe failed: {e}"));
    let (second, mut b) = driver.subscribe_lifecycle().await.unwrap_or_else(|e| panic!("subscribe failed: {e}"));
    assert_eq!(driver.subscriber_count().await, 2);
    driver.suspend(&dom).await.unwrap_or_else(|e| panic!("suspend failed: {e}"));
    driver.unsubscribe_lifecycle(second).await.unwrap_or_else(|e| panic!("unsubscribe failed: {e}"));
    driver.resume(&dom).await.unwrap_or_else(|e| panic!("resume failed: {e}"));
    assert_eq!(kinds(&drain(&mut a)), ["Suspended", "Resumed"]);
    assert_eq!(kinds(&drain(&mut b)), ["Suspended"]);
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Create,
    Shutdown,
    Destroy,
    Suspend,
    Resume,
    ManagedSave,
    Reboot,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Create),
        Just(Op::Shutdown),
        Just(Op::Destroy),
        Just(Op::Suspend),
        Just(Op::Resume),
        Just(Op::ManagedSave),
        Just(Op::Reboot),
    ]
}

async fn apply(driver: &TestDriver, dom: &DomainRef, op: Op) -> Result<(), DriverError> {
    match op {
        Op::Create => driver.create(dom, 0).await,
        Op::Shutdown => driver.shutdown(dom, 0).await,
        Op::Destroy => driver.destroy(dom, 0).await,
        Op::Suspend => driver.suspend(dom).await,
        Op::Resume => driver.resume(dom).await,
        Op::ManagedSave => driver.managed_save(dom, 0).await,
        Op::Reboot => driver.reboot(dom, 0).await,
    }
}

proptest! {
    #[test]
    fn random_operation_sequences_keep_invariants(ops in proptest::collection::vec(op(), 1..40)) {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => panic!("runtime: {e}"),
        };
        runtime.block_on(async {
            let driver = TestDriver::new_default();
            let (_, mut rx) = driver.subscribe_lifecycle().await.unwrap_or_else(|e| panic!("subscribe failed: {e}"));
            let dom = driver.lookup_by_name(DEFAULT_DOMAIN_NAME).await.unwrap_or_else(|e| panic!("lookup failed: {e}"));
            for op in ops {
                let outcome = apply(&driver, &dom, op).await;
                let raised = drain(&mut rx);
                if outcome.is_err() {
                    assert!(raised.is_empty(), "{op:?} failed but raised {raised:?}");
                }
                let (state, _) = driver.state(&dom).await.unwrap_or_else(|e| panic!("state failed: {e}"));
                let id = DomainId::from_running(driver.id(&dom).await.unwrap_or_else(|e| panic!("id failed: {e}")));
                let active = driver.is_active(&dom).await.unwrap_or_else(|e| panic!("is_active failed: {e}"));
                assert_eq!(active, id.is_valid() && state.is_running_family(), "after {op:?}");
                assert!(raised.windows(2).all(|w| w[0].seq < w[1].seq));
                assert!(raised.iter().all(|e| e.kind != LifecycleEventKind::Undefined));
            }
        });
    }
}
