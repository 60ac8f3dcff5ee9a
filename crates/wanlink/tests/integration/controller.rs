//! Controller tests against a scripted executor.

use std::sync::Arc;

use wanlink::impair::controller::ApplySelection;
use wanlink::{ControllerConfig, ImpairmentController, ImpairmentSpec, InterfaceRef};

use crate::common::{CLEAN_QDISC, SHAPED_QDISC, StubExecutor};

fn controller(exec: StubExecutor) -> (ImpairmentController<StubExecutor>, Arc<StubExecutor>) {
    let exec = Arc::new(exec);
    (ImpairmentController::from_arc(Arc::clone(&exec)), exec)
}

fn link(key: &str) -> InterfaceRef {
    key.parse().unwrap()
}

// ============================================================================
// Single link
// ============================================================================

#[tokio::test]
async fn test_round_trip_shaped() {
    let (ctl, exec) = controller(
        StubExecutor::new().respond("client1", "tc -s qdisc show dev eth0", 0, SHAPED_QDISC),
    );
    let link = InterfaceRef::new("client1", "eth0@if23:");
    let spec = ImpairmentSpec::new()
        .delay_ms(50)
        .loss_pct(2.0)
        .rate("10mbit")
        .queue_limit(1000);

    ctl.apply(&link, &spec).await.unwrap();
    assert_eq!(
        exec.commands_for("client1"),
        [
            "tc qdisc del dev eth0 root",
            "tc qdisc add dev eth0 root handle 1: tbf rate 10mbit burst 32kbit latency 400ms",
            "tc qdisc add dev eth0 parent 1:1 handle 10: netem delay 50ms loss 2% limit 1000",
        ]
    );

    let report = ctl.status(&link).await.unwrap();
    assert_eq!(report.key(), "client1:eth0");
    assert_eq!(report.qdisc, SHAPED_QDISC);

    let status = &report.summary;
    assert!(status.active);
    assert_eq!(status.delay_ms, Some(50));
    assert_eq!(status.loss_pct, Some(2.0));
    assert_eq!(status.rate.as_deref(), spec.rate.as_deref());
    assert_eq!(status.queue_limit, spec.queue_limit);
}

#[tokio::test]
async fn test_removal_failure_does_not_fail_apply() {
    let (ctl, exec) = controller(StubExecutor::new().respond(
        "client1",
        "tc qdisc del",
        2,
        "Error: Cannot delete qdisc with handle of zero.\n",
    ));

    ctl.apply(&link("client1:eth0"), &ImpairmentSpec::new().delay_ms(10))
        .await
        .unwrap();
    assert_eq!(exec.call_count(), 2);
}

#[tokio::test]
async fn test_removal_transport_failure_does_not_fail_apply() {
    let (ctl, exec) =
        controller(StubExecutor::new().transport_failure("client1", "tc qdisc del"));

    ctl.apply(&link("client1:eth0"), &ImpairmentSpec::new().loss_pct(1.0))
        .await
        .unwrap();
    ctl.clear(&link("client1:eth0")).await.unwrap();
    assert_eq!(exec.call_count(), 3);
}

#[tokio::test]
async fn test_required_failure_carries_output() {
    let (ctl, exec) = controller(StubExecutor::new().respond(
        "client1",
        "tc qdisc add",
        2,
        "RTNETLINK answers: Operation not permitted\n",
    ));

    let err = ctl
        .apply(&link("client1:eth0"), &ImpairmentSpec::new().delay_ms(10))
        .await
        .unwrap_err();
    assert!(err.is_execution());
    assert_eq!(err.status_code(), 500);
    assert!(err.output().unwrap().contains("Operation not permitted"));
    assert!(err.to_string().contains("netem delay 10ms"));
    assert_eq!(exec.call_count(), 2);
}

#[tokio::test]
async fn test_unknown_target_propagates() {
    let (ctl, _exec) = controller(StubExecutor::new().unknown_target("ghost"));

    let err = ctl.clear(&link("ghost:eth0")).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.status_code(), 404);

    let err = ctl
        .apply(&link("ghost:eth0"), &ImpairmentSpec::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = ctl.status(&link("ghost:eth0")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_status_nonzero_exit_is_error() {
    let (ctl, _exec) = controller(StubExecutor::new().respond(
        "client1",
        "tc -s qdisc show",
        1,
        "Cannot find device \"eth7\"\n",
    ));

    let err = ctl.status(&link("client1:eth7")).await.unwrap_err();
    assert!(err.is_execution());
    assert!(err.output().unwrap().contains("Cannot find device"));
}

#[tokio::test]
async fn test_status_clean_link() {
    let (ctl, _exec) =
        controller(StubExecutor::new().respond_all("tc -s qdisc show", 0, CLEAN_QDISC));

    let report = ctl.status_target("server").await.unwrap();
    assert_eq!(report.key(), "server:eth0");
    assert!(!report.summary.active);
}

#[tokio::test]
async fn test_whole_target_uses_configured_interface() {
    let (ctl, exec) = controller(StubExecutor::new());
    let ctl = ctl.with_config(ControllerConfig::new().default_interface("ens5"));

    ctl.apply_target("router", &ImpairmentSpec::new().delay_ms(5))
        .await
        .unwrap();
    ctl.clear_target("router").await.unwrap();

    assert!(exec.commands().iter().all(|c| c.contains("dev ens5 ")));
}

// ============================================================================
// Batches
// ============================================================================

#[tokio::test]
async fn test_empty_batches_issue_nothing() {
    let (ctl, exec) = controller(StubExecutor::new());

    let err = ctl
        .apply_batch(&[], &ImpairmentSpec::new().delay_ms(10))
        .await
        .unwrap_err();
    assert!(err.is_empty_selection());
    assert_eq!(err.status_code(), 400);

    let err = ctl.apply_matrix(&[]).await.unwrap_err();
    assert!(err.is_empty_selection());

    let err = ctl
        .apply_selection(&ApplySelection::new(), &ImpairmentSpec::new())
        .await
        .unwrap_err();
    assert!(err.is_empty_selection());

    assert_eq!(exec.call_count(), 0);
}

#[tokio::test]
async fn test_apply_batch_touched_keys() {
    let (ctl, exec) = controller(StubExecutor::new());
    let links = [
        link("client1:eth0"),
        link("client2:eth0@if40"),
        link("client1:eth0"),
        link("client1:eth1"),
    ];

    let touched = ctl
        .apply_batch(&links, &ImpairmentSpec::new().loss_pct(1.0))
        .await
        .unwrap();
    assert_eq!(touched, ["client1:eth0", "client2:eth0", "client1:eth1"]);
    // two commands per distinct link
    assert_eq!(exec.call_count(), 6);
}

#[tokio::test]
async fn test_apply_batch_aborts_on_first_failure() {
    let (ctl, exec) = controller(StubExecutor::new().respond("b", "tc qdisc add", 2, "nope"));
    let links = [link("a:eth0"), link("b:eth0"), link("c:eth0")];

    let err = ctl
        .apply_batch(&links, &ImpairmentSpec::new().delay_ms(1))
        .await
        .unwrap_err();
    assert!(err.is_execution());
    assert_eq!(exec.commands_for("a").len(), 2);
    assert_eq!(exec.commands_for("b").len(), 2);
    assert!(exec.commands_for("c").is_empty());
}

#[tokio::test]
async fn test_apply_batch_rejects_invalid_name_up_front() {
    let (ctl, exec) = controller(StubExecutor::new());
    let links = [link("a:eth0"), InterfaceRef::new("b", "eth0;reboot")];

    let err = ctl
        .apply_batch(&links, &ImpairmentSpec::new())
        .await
        .unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(exec.call_count(), 0);
}

#[tokio::test]
async fn test_apply_matrix_distinct_specs() {
    let (ctl, exec) = controller(StubExecutor::new());
    let items = vec![
        (link("a:eth0"), ImpairmentSpec::new().delay_ms(10)),
        (link("b:eth1"), ImpairmentSpec::new().rate("5mbit")),
    ];

    assert_eq!(ctl.apply_matrix(&items).await.unwrap(), 2);
    assert_eq!(
        exec.commands_for("a")[1],
        "tc qdisc add dev eth0 root handle 10: netem delay 10ms"
    );
    assert_eq!(exec.commands_for("b").len(), 3);
    assert!(exec.commands_for("b")[1].contains("tbf rate 5mbit"));
}

#[tokio::test]
async fn test_apply_selection_dedup() {
    let (ctl, exec) = controller(StubExecutor::new());
    let selection = ApplySelection::new()
        .sources(["a", "b"])
        .targets(["b", "c"])
        .both(true);

    let touched = ctl
        .apply_selection(&selection, &ImpairmentSpec::new().delay_ms(20))
        .await
        .unwrap();
    assert_eq!(touched, ["a", "b", "c"]);

    for target in ["a", "b", "c"] {
        let removals = exec
            .commands_for(target)
            .iter()
            .filter(|c| c.starts_with("tc qdisc del"))
            .count();
        assert_eq!(removals, 1, "{target} touched more than once");
    }
}

#[tokio::test]
async fn test_apply_selection_without_both_skips_targets() {
    let (ctl, exec) = controller(StubExecutor::new());
    let selection = ApplySelection::new().sources(["a"]).targets(["c"]);

    let touched = ctl
        .apply_selection(&selection, &ImpairmentSpec::new())
        .await
        .unwrap();
    assert_eq!(touched, ["a"]);
    assert!(exec.commands_for("c").is_empty());
}

#[tokio::test]
async fn test_status_batch_isolates_failures() {
    let (ctl, _exec) = controller(
        StubExecutor::new()
            .respond_all("tc -s qdisc show", 0, SHAPED_QDISC)
            .unknown_target("b"),
    );
    let links = [link("a:eth0"), link("b:eth0"), link("c:eth0")];

    let out = ctl.status_batch(&links).await;
    assert_eq!(out.len(), 3);
    assert_eq!(out.values().filter(|e| e.is_error()).count(), 1);
    assert!(out["b:eth0"].is_error());
    assert!(out["a:eth0"].report().unwrap().summary.active);
    assert!(out["c:eth0"].report().unwrap().summary.active);

    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["b:eth0"]["error"], "target not found: b");
    assert_eq!(json["a:eth0"]["summary"]["rate"], "10mbit");
}

// ============================================================================
// Probe
// ============================================================================

#[tokio::test]
async fn test_probe() {
    let (ctl, exec) = controller(StubExecutor::new().respond(
        "client1",
        "ping",
        0,
        "4 packets transmitted, 4 received, 0% packet loss\n",
    ));

    let report = ctl.probe("client1", "server", 4, 0).await.unwrap();
    assert!(report.ok);
    assert_eq!(report.rc, 0);
    assert_eq!(exec.commands(), ["ping -c 4 -W 1 server"]);
}
