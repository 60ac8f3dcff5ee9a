//! Telemetry streamer tests on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_stream::StreamExt;
use wanlink::{ImpairmentController, TelemetryStreamer};

use crate::common::{CLEAN_QDISC, SHAPED_QDISC, StubExecutor, StubRegistry};

fn streamer(
    exec: StubExecutor,
    registry: &Arc<StubRegistry>,
) -> TelemetryStreamer<StubExecutor, Arc<StubRegistry>> {
    TelemetryStreamer::new(ImpairmentController::new(exec), Arc::clone(registry))
}

fn executor() -> StubExecutor {
    StubExecutor::new()
        .respond_all("tc -s qdisc show", 0, CLEAN_QDISC)
        .respond("client1", "tc -s qdisc show", 0, SHAPED_QDISC)
        .unknown_target("gone")
}

#[tokio::test]
async fn test_snapshot_covers_every_link() {
    let registry = Arc::new(StubRegistry::new());
    registry.set("client1", &["eth0@if23", "eth1@if25"]);
    registry.set("server", &["eth0"]);

    let mut s = streamer(executor(), &registry);
    let snap = s.snapshot().await;

    assert_eq!(snap.cycle, 1);
    assert_eq!(
        snap.links.keys().collect::<Vec<_>>(),
        ["client1:eth0", "client1:eth1", "server:eth0"]
    );
    assert!(snap.get("client1:eth0").unwrap().summary.active);
    assert!(!snap.get("server:eth0").unwrap().summary.active);
}

#[tokio::test]
async fn test_failing_links_are_omitted() {
    let registry = Arc::new(StubRegistry::new());
    registry.set("client1", &["eth0"]);
    registry.set("gone", &["eth0"]);
    registry.set("flaky", &["eth0"]);
    registry.break_target("flaky");

    let mut s = streamer(executor(), &registry);
    let snap = s.snapshot().await;

    assert_eq!(snap.len(), 1);
    assert!(snap.get("gone:eth0").is_none());
    assert!(snap.get("flaky:eth0").is_none());
}

#[tokio::test]
async fn test_registry_failure_yields_empty_snapshot() {
    let registry = Arc::new(StubRegistry::new());
    registry.set("client1", &["eth0"]);
    registry.fail_listing(true);

    let mut s = streamer(executor(), &registry);
    let snap = s.snapshot().await;
    assert_eq!(snap.cycle, 1);
    assert!(snap.is_empty());

    registry.fail_listing(false);
    let snap = s.snapshot().await;
    assert_eq!(snap.cycle, 2);
    assert_eq!(snap.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stream_cycles_follow_registry() {
    let registry = Arc::new(StubRegistry::new());
    registry.set("client1", &["eth0"]);

    let stream = streamer(executor(), &registry)
        .interval(Duration::from_secs(1))
        .into_stream();
    tokio::pin!(stream);

    let start = Instant::now();
    let first = stream.next().await.unwrap();
    assert_eq!(first.cycle, 1);
    assert_eq!(first.len(), 1);
    // first snapshot does not wait for the timer
    assert!(start.elapsed() < Duration::from_secs(1));

    registry.set("server", &["eth0"]);
    let second = stream.next().await.unwrap();
    assert_eq!(second.cycle, 2);
    assert_eq!(second.len(), 2);
    assert!(start.elapsed() >= Duration::from_secs(1));

    registry.remove("client1");
    let third = stream.next().await.unwrap();
    assert_eq!(third.cycle, 3);
    assert_eq!(third.links.keys().collect::<Vec<_>>(), ["server:eth0"]);
}

#[tokio::test(start_paused = true)]
async fn test_next_snapshot_waits_for_interval() {
    let registry = Arc::new(StubRegistry::new());
    registry.set("client1", &["eth0"]);

    let mut s = streamer(executor(), &registry).interval(Duration::from_millis(250));

    let start = Instant::now();
    assert_eq!(s.next_snapshot().await.cycle, 1);
    assert_eq!(s.next_snapshot().await.cycle, 2);
    assert_eq!(s.next_snapshot().await.cycle, 3);
    assert!(start.elapsed() >= Duration::from_millis(500));
    assert_eq!(s.cycle(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_snapshot_leaves_cycle_unchanged() {
    let registry = Arc::new(StubRegistry::new());
    registry.set("client1", &["eth0"]);
    registry.set("server", &["eth0"]);

    // each status read takes 100ms, a full cycle 200ms
    let mut s = streamer(executor().latency(Duration::from_millis(100)), &registry);

    let cut_short = tokio::time::timeout(Duration::from_millis(150), s.snapshot()).await;
    assert!(cut_short.is_err());
    assert_eq!(s.cycle(), 0);

    let snap = s.snapshot().await;
    assert_eq!(snap.cycle, 1);
    assert_eq!(snap.len(), 2);
    assert_eq!(s.cycle(), 1);

    let snap = s.snapshot().await;
    assert_eq!(snap.cycle, 2);
}

#[tokio::test]
async fn test_snapshot_serializes_by_key() {
    let registry = Arc::new(StubRegistry::new());
    registry.set("client1", &["eth0"]);

    let mut s = streamer(executor(), &registry);
    let json = serde_json::to_value(s.snapshot().await).unwrap();

    assert_eq!(json["cycle"], 1);
    let link = &json["links"]["client1:eth0"];
    assert_eq!(link["target"], "client1");
    assert_eq!(link["iface"], "eth0");
    assert_eq!(link["summary"]["delay_ms"], 50);
}
