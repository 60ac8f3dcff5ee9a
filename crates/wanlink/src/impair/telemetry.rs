//! Periodic telemetry polling.
//!
//! [`TelemetryStreamer`] asks its [`TargetRegistry`] for the current set of
//! (target, interface) pairs on every cycle, reads each one through the
//! controller and emits a [`Snapshot`]. Links whose read fails are left out
//! of that cycle; nothing ever ends the stream except dropping it.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tokio_stream::StreamExt;
//! use wanlink::TelemetryStreamer;
//!
//! let stream = TelemetryStreamer::new(controller, registry)
//!     .interval(Duration::from_millis(500))
//!     .into_stream();
//! tokio::pin!(stream);
//!
//! while let Some(snapshot) = stream.next().await {
//!     println!("cycle {}: {} links", snapshot.cycle, snapshot.len());
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::{Stream, StreamExt};

use super::controller::{ImpairmentController, StatusReport};
use super::executor::RemoteExecutor;
use super::interface_ref::InterfaceRef;
use super::registry::TargetRegistry;

/// Default poll interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Status of every reachable link at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    /// Reports keyed by `target:interface`.
    pub links: BTreeMap<String, StatusReport>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&StatusReport> {
        self.links.get(key)
    }
}

/// Polls every discovered link at a fixed interval.
pub struct TelemetryStreamer<E, R> {
    controller: ImpairmentController<E>,
    registry: Arc<R>,
    period: Duration,
    cycle: u64,
    ticker: Option<Interval>,
}

impl<E: RemoteExecutor, R: TargetRegistry> TelemetryStreamer<E, R> {
    pub fn new(controller: ImpairmentController<E>, registry: R) -> Self {
        Self {
            controller,
            registry: Arc::new(registry),
            period: DEFAULT_INTERVAL,
            cycle: 0,
            ticker: None,
        }
    }

    /// Set the poll interval (at least 1ms).
    pub fn interval(mut self, period: Duration) -> Self {
        self.period = period.max(MIN_INTERVAL);
        self.ticker = None;
        self
    }

    /// The poll interval.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of snapshots produced so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Assemble a snapshot now, without waiting for the timer.
    ///
    /// Dropping the future before it completes leaves the cycle counter
    /// unchanged.
    pub async fn snapshot(&mut self) -> Snapshot {
        let cycle = self.cycle + 1;
        let snapshot = assemble(&self.controller, self.registry.as_ref(), cycle).await;
        self.cycle = cycle;
        snapshot
    }

    /// Wait for the next tick, then assemble a snapshot.
    ///
    /// The first call returns without waiting. A cycle that overruns the
    /// interval pushes the following ticks back instead of bursting.
    pub async fn next_snapshot(&mut self) -> Snapshot {
        let period = self.period;
        let ticker = self.ticker.get_or_insert_with(|| new_ticker(period));
        ticker.tick().await;
        self.snapshot().await
    }

    /// Turn the streamer into an endless stream of snapshots.
    ///
    /// Must be called inside a tokio runtime.
    pub fn into_stream(self) -> impl Stream<Item = Snapshot> {
        let Self {
            controller,
            registry,
            period,
            cycle,
            ticker,
        } = self;

        let mut next_cycle = cycle;
        let ticker = ticker.unwrap_or_else(|| new_ticker(period));

        IntervalStream::new(ticker).then(move |_| {
            next_cycle += 1;
            let cycle = next_cycle;
            let controller = controller.clone();
            let registry = Arc::clone(&registry);
            async move { assemble(&controller, registry.as_ref(), cycle).await }
        })
    }
}

fn new_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Read every link the registry knows about, one after another.
async fn assemble<E, R>(controller: &ImpairmentController<E>, registry: &R, cycle: u64) -> Snapshot
where
    E: RemoteExecutor,
    R: TargetRegistry,
{
    let mut snapshot = Snapshot {
        cycle,
        links: BTreeMap::new(),
    };

    let targets = match registry.list_targets().await {
        Ok(targets) => targets,
        Err(e) => {
            tracing::warn!("cycle {}: cannot list targets: {}", cycle, e);
            return snapshot;
        }
    };

    for target in targets {
        let interfaces = match registry.list_interfaces(&target).await {
            Ok(interfaces) => interfaces,
            Err(e) => {
                tracing::debug!("cycle {}: {}: cannot list interfaces: {}", cycle, target, e);
                continue;
            }
        };

        for info in interfaces {
            let link = InterfaceRef::new(target.as_str(), &info.iface);
            match controller.status(&link).await {
                Ok(report) => {
                    snapshot.links.insert(link.key(), report);
                }
                Err(e) => tracing::debug!("cycle {}: {}: omitted: {}", cycle, link, e),
            }
        }
    }

    snapshot
}
