//! Link impairment: programs, execution, statistics and telemetry.
//!
//! # Layout
//!
//! - [`spec`] / [`interface_ref`]: what to apply, and where
//! - [`program`]: pure translation of a spec into `tc` command lines
//! - [`stats`]: pure parsing of `tc -s qdisc show` output
//! - [`executor`] / [`registry`] / [`discovery`]: reaching targets
//! - [`controller`]: apply, clear, status and their batch forms
//! - [`telemetry`]: periodic snapshots of every discovered link

pub mod controller;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod interface_ref;
pub mod program;
pub mod registry;
pub mod spec;
pub mod stats;
pub mod telemetry;

pub use controller::{
    ApplySelection, ControllerConfig, ImpairmentController, ProbeReport, StatusEntry,
    StatusReport,
};
pub use discovery::InterfaceInfo;
pub use error::{Error, Result};
pub use executor::{DockerExecutor, ExecOutput, LocalExecutor, NetnsExecutor, RemoteExecutor};
pub use interface_ref::InterfaceRef;
pub use program::{FailurePolicy, QdiscCommand, QdiscProgram};
pub use registry::{DockerRegistry, NetnsRegistry, StaticRegistry, TargetRegistry};
pub use spec::ImpairmentSpec;
pub use stats::LinkStatus;
pub use telemetry::{Snapshot, TelemetryStreamer};
