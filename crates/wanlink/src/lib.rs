//! Link impairment control engine.
//!
//! This crate drives Linux traffic control on the virtual interfaces of
//! isolated workloads (containers, network namespaces). It turns a
//! declarative [`ImpairmentSpec`] into an ordered `tc` program, runs that
//! program through a [`RemoteExecutor`], reads `tc -s qdisc show` output
//! back into a structured [`LinkStatus`], and polls many interfaces at a
//! fixed cadence for live telemetry.
//!
//! # Example
//!
//! ```ignore
//! use wanlink::{ImpairmentController, ImpairmentSpec, InterfaceRef};
//! use wanlink::impair::executor::DockerExecutor;
//!
//! #[tokio::main]
//! async fn main() -> wanlink::Result<()> {
//!     let controller = ImpairmentController::new(DockerExecutor::new());
//!
//!     let link = InterfaceRef::new("client1", "eth0@if23");
//!     let spec = ImpairmentSpec::new()
//!         .delay_ms(50)
//!         .jitter_ms(5)
//!         .loss_pct(2.0)
//!         .rate("10mbit");
//!
//!     controller.apply(&link, &spec).await?;
//!
//!     let report = controller.status(&link).await?;
//!     println!("{}: drops {:.3}%", report.key(), report.summary.drops.pct);
//!     Ok(())
//! }
//! ```
//!
//! # Telemetry
//!
//! ```ignore
//! use std::time::Duration;
//! use tokio_stream::StreamExt;
//! use wanlink::TelemetryStreamer;
//!
//! let mut stream = TelemetryStreamer::new(controller, registry)
//!     .interval(Duration::from_secs(1))
//!     .into_stream();
//!
//! while let Some(snapshot) = stream.next().await {
//!     for (key, report) in &snapshot.links {
//!         println!("{key}: {:?}", report.summary.delay_ms);
//!     }
//! }
//! ```

pub mod impair;
pub mod util;

// Re-export common types at crate root for convenience
pub use impair::{
    ControllerConfig, Error, ImpairmentController, ImpairmentSpec, InterfaceRef, LinkStatus,
    RemoteExecutor, Result, StatusReport, TargetRegistry, TelemetryStreamer,
};
