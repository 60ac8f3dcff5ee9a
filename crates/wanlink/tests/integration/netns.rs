//! Live tests against real network namespaces.
//!
//! Each test creates a namespace with an up `dummy0` and drives it through
//! `NetnsExecutor`.

use wanlink::impair::executor::NetnsExecutor;
use wanlink::impair::registry::{self, NetnsRegistry};
use wanlink::{ImpairmentController, ImpairmentSpec, InterfaceRef, TargetRegistry};

use crate::common::TestNamespace;

#[tokio::test]
async fn test_apply_status_clear_shaped() {
    require_root!();

    let ns = TestNamespace::with_dummy("shaped").unwrap();
    let ctl = ImpairmentController::new(NetnsExecutor::new());
    let link = InterfaceRef::new(ns.name(), "dummy0");

    let spec = ImpairmentSpec::new()
        .delay_ms(50)
        .loss_pct(2.0)
        .rate("10mbit")
        .queue_limit(1000);
    ctl.apply(&link, &spec).await.unwrap();

    let status = ctl.status(&link).await.unwrap().summary;
    assert!(status.active);
    assert_eq!(status.delay_ms, Some(50));
    assert_eq!(status.loss_pct, Some(2.0));
    assert_eq!(status.rate.as_deref(), Some("10mbit"));
    assert_eq!(status.queue_limit, Some(1000));

    ctl.clear(&link).await.unwrap();
    assert!(!ctl.status(&link).await.unwrap().summary.active);

    // clearing a clean link is not an error
    ctl.clear(&link).await.unwrap();
}

#[tokio::test]
async fn test_reapply_replaces_hierarchy() {
    require_root!();

    let ns = TestNamespace::with_dummy("replace").unwrap();
    let ctl = ImpairmentController::new(NetnsExecutor::new());
    let link = InterfaceRef::new(ns.name(), "dummy0");

    ctl.apply(&link, &ImpairmentSpec::new().rate("5mbit"))
        .await
        .unwrap();
    ctl.apply(&link, &ImpairmentSpec::new().delay_ms(20).jitter_ms(5))
        .await
        .unwrap();

    let status = ctl.status(&link).await.unwrap().summary;
    assert_eq!(status.rate, None);
    assert_eq!(status.delay_ms, Some(20));
    assert_eq!(status.jitter_ms, Some(5));
}

#[tokio::test]
async fn test_unknown_device_fails_apply() {
    require_root!();

    let ns = TestNamespace::with_dummy("nodev").unwrap();
    let ctl = ImpairmentController::new(NetnsExecutor::new());
    let link = InterfaceRef::new(ns.name(), "nosuch0");

    let err = ctl
        .apply(&link, &ImpairmentSpec::new().delay_ms(1))
        .await
        .unwrap_err();
    assert!(err.is_execution());
}

#[tokio::test]
async fn test_registry_discovers_dummy() {
    require_root!();

    let ns = TestNamespace::with_dummy("discover").unwrap();
    let registry = NetnsRegistry::new(NetnsExecutor::new());

    assert!(
        registry
            .list_targets()
            .await
            .unwrap()
            .iter()
            .any(|t| t == ns.name())
    );

    let ifaces = registry.list_interfaces(ns.name()).await.unwrap();
    assert!(ifaces.iter().any(|i| i.iface == "dummy0"));
    assert!(ifaces.iter().all(|i| i.iface != "lo"));

    let links = registry::discover(&registry).await.unwrap();
    assert!(links.contains(&InterfaceRef::new(ns.name(), "dummy0")));
}
