//! Impairment controller.
//!
//! [`ImpairmentController`] ties the pieces together: it validates an
//! [`ImpairmentSpec`], builds the `tc` program for an interface, runs it
//! through the injected [`RemoteExecutor`] and reads statistics back.
//!
//! Single-link operations take an [`InterfaceRef`]. Whole-target operations
//! (`*_target`, [`ApplySelection`]) use the configured default interface.
//!
//! # Example
//!
//! ```ignore
//! use wanlink::{ImpairmentController, ImpairmentSpec, InterfaceRef};
//! use wanlink::impair::executor::NetnsExecutor;
//!
//! let controller = ImpairmentController::new(NetnsExecutor::new());
//! let links = ["client1:eth0".parse()?, "client2:eth0".parse()?];
//!
//! let spec = ImpairmentSpec::new().delay_ms(80).loss_pct(0.5);
//! let touched = controller.apply_batch(&links, &spec).await?;
//! assert_eq!(touched, ["client1:eth0", "client2:eth0"]);
//!
//! for (key, entry) in controller.status_batch(&links).await {
//!     println!("{key}: {entry:?}");
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::executor::RemoteExecutor;
use super::interface_ref::InterfaceRef;
use super::program::{self, FailurePolicy, QdiscProgram};
use super::spec::ImpairmentSpec;
use super::stats::{self, LinkStatus};

/// Interface used by whole-target operations unless configured otherwise.
pub const DEFAULT_INTERFACE: &str = "eth0";

/// Maximum number of echo requests a probe sends.
pub const MAX_PROBE_COUNT: u32 = 10;

/// Controller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Interface addressed by whole-target operations.
    pub default_interface: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_interface: DEFAULT_INTERFACE.to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interface used by whole-target operations.
    pub fn default_interface(mut self, name: impl AsRef<str>) -> Self {
        self.default_interface = crate::util::ifname::canonicalize(name.as_ref()).to_string();
        self
    }
}

/// Result of a status read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub target: String,
    #[serde(rename = "iface")]
    pub interface: String,
    /// Raw `tc -s qdisc show` output.
    pub qdisc: String,
    /// Parsed form of `qdisc`.
    pub summary: LinkStatus,
}

impl StatusReport {
    /// Status key, `target:interface`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.target, self.interface)
    }
}

/// One entry of a batch status read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatusEntry {
    Report(StatusReport),
    Error { error: String },
}

impl StatusEntry {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// The report, if the read succeeded.
    pub fn report(&self) -> Option<&StatusReport> {
        match self {
            Self::Report(report) => Some(report),
            Self::Error { .. } => None,
        }
    }
}

/// Whole-target selection: every source, plus every target when `both`
/// is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplySelection {
    pub sources: Vec<String>,
    pub targets: Vec<String>,
    pub both: bool,
}

impl ApplySelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn both(mut self, both: bool) -> Self {
        self.both = both;
        self
    }

    /// Selected target ids, sources first, each once.
    pub fn resolve(&self) -> Vec<&str> {
        let extra: &[String] = if self.both { &self.targets } else { &[] };
        dedup(self.sources.iter().chain(extra).map(String::as_str))
    }
}

/// Outcome of a reachability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// ping exited 0.
    pub ok: bool,
    /// ping exit status.
    pub rc: i32,
    /// ping output.
    pub out: String,
}

/// Applies, clears and reads impairments through a [`RemoteExecutor`].
#[derive(Debug)]
pub struct ImpairmentController<E> {
    exec: Arc<E>,
    config: ControllerConfig,
}

impl<E> Clone for ImpairmentController<E> {
    fn clone(&self) -> Self {
        Self {
            exec: Arc::clone(&self.exec),
            config: self.config.clone(),
        }
    }
}

impl<E: RemoteExecutor> ImpairmentController<E> {
    /// Create a controller with the default configuration.
    pub fn new(exec: E) -> Self {
        Self::from_arc(Arc::new(exec))
    }

    /// Create a controller sharing an existing executor.
    pub fn from_arc(exec: Arc<E>) -> Self {
        Self {
            exec,
            config: ControllerConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The executor commands are run through.
    pub fn executor(&self) -> &E {
        &self.exec
    }

    /// Reference to the default interface of `target`.
    pub fn default_ref(&self, target: &str) -> InterfaceRef {
        InterfaceRef::new(target, &self.config.default_interface)
    }

    // ------------------------------------------------------------------------
    // Single link
    // ------------------------------------------------------------------------

    /// Replace the qdisc hierarchy of `link` with `spec`.
    pub async fn apply(&self, link: &InterfaceRef, spec: &ImpairmentSpec) -> Result<()> {
        spec.validate()?;
        link.validate()?;
        self.run_program(link, &program::build(spec, link.interface()))
            .await
    }

    /// Remove any qdisc hierarchy from `link`. A missing hierarchy is not
    /// an error.
    pub async fn clear(&self, link: &InterfaceRef) -> Result<()> {
        link.validate()?;
        self.run_program(link, &program::clear_program(link.interface()))
            .await
    }

    /// Read and parse the qdisc statistics of `link`.
    pub async fn status(&self, link: &InterfaceRef) -> Result<StatusReport> {
        link.validate()?;
        let command = program::status_command(link.interface());
        let out = self.exec.execute(link.target(), &command).await?;
        if !out.success() {
            return Err(Error::Execution {
                target: link.target().to_string(),
                command,
                status: Some(out.status),
                output: out.output,
            });
        }

        let summary = stats::parse(&out.output);
        Ok(StatusReport {
            target: link.target().to_string(),
            interface: link.interface().to_string(),
            qdisc: out.output,
            summary,
        })
    }

    // ------------------------------------------------------------------------
    // Whole target
    // ------------------------------------------------------------------------

    /// [`apply`](Self::apply) on the default interface of `target`.
    pub async fn apply_target(&self, target: &str, spec: &ImpairmentSpec) -> Result<()> {
        self.apply(&self.default_ref(target), spec).await
    }

    /// [`clear`](Self::clear) on the default interface of `target`.
    pub async fn clear_target(&self, target: &str) -> Result<()> {
        self.clear(&self.default_ref(target)).await
    }

    /// [`status`](Self::status) on the default interface of `target`.
    pub async fn status_target(&self, target: &str) -> Result<StatusReport> {
        self.status(&self.default_ref(target)).await
    }

    // ------------------------------------------------------------------------
    // Batches
    // ------------------------------------------------------------------------

    /// Apply the same spec to every link. Returns the touched keys, each
    /// once, in first-seen order.
    ///
    /// Nothing runs if `links` is empty or any input is invalid. The first
    /// failing link aborts the rest.
    pub async fn apply_batch(
        &self,
        links: &[InterfaceRef],
        spec: &ImpairmentSpec,
    ) -> Result<Vec<String>> {
        if links.is_empty() {
            return Err(Error::EmptySelection {
                operation: "apply_batch",
            });
        }
        spec.validate()?;
        for link in links {
            link.validate()?;
        }

        let keys = dedup_owned(links.iter().map(InterfaceRef::key));
        let mut seen = HashSet::new();
        for link in links {
            if seen.insert(link.key()) {
                self.apply(link, spec).await?;
            }
        }
        Ok(keys)
    }

    /// Apply a distinct spec per link, in order. Returns the item count.
    pub async fn apply_matrix(&self, items: &[(InterfaceRef, ImpairmentSpec)]) -> Result<usize> {
        if items.is_empty() {
            return Err(Error::EmptySelection {
                operation: "apply_matrix",
            });
        }
        for (link, spec) in items {
            spec.validate()?;
            link.validate()?;
        }

        for (link, spec) in items {
            self.apply(link, spec).await?;
        }
        Ok(items.len())
    }

    /// Apply `spec` to the default interface of every selected target.
    /// Returns the touched target ids.
    pub async fn apply_selection(
        &self,
        selection: &ApplySelection,
        spec: &ImpairmentSpec,
    ) -> Result<Vec<String>> {
        let targets = selection.resolve();
        if targets.is_empty() {
            return Err(Error::EmptySelection {
                operation: "apply_selection",
            });
        }
        spec.validate()?;

        let mut touched = Vec::with_capacity(targets.len());
        for target in targets {
            self.apply_target(target, spec).await?;
            touched.push(target.to_string());
        }
        Ok(touched)
    }

    /// Read every link. Failures are recorded per key; the call itself
    /// never fails.
    pub async fn status_batch(&self, links: &[InterfaceRef]) -> BTreeMap<String, StatusEntry> {
        let mut out = BTreeMap::new();
        for link in links {
            let entry = match self.status(link).await {
                Ok(report) => StatusEntry::Report(report),
                Err(e) => {
                    tracing::debug!("{}: status failed: {}", link, e);
                    StatusEntry::Error {
                        error: e.to_string(),
                    }
                }
            };
            out.insert(link.key(), entry);
        }
        out
    }

    // ------------------------------------------------------------------------
    // Tools
    // ------------------------------------------------------------------------

    /// Ping `destination` from inside `source`.
    ///
    /// `count` is clamped to 1..=10; `size` is passed as `-s` when non-zero.
    /// A failing ping is reported in the result, not as an error.
    pub async fn probe(
        &self,
        source: &str,
        destination: &str,
        count: u32,
        size: u32,
    ) -> Result<ProbeReport> {
        validate_host(destination)?;
        let command = probe_command(destination, count, size);
        let out = self.exec.execute(source, &command).await?;
        Ok(ProbeReport {
            ok: out.success(),
            rc: out.status,
            out: out.output,
        })
    }

    async fn run_program(&self, link: &InterfaceRef, program: &QdiscProgram) -> Result<()> {
        let target = link.target();
        for command in program {
            let result = self.exec.execute(target, &command.line).await;
            match (command.policy, result) {
                (_, Ok(out)) if out.success() => {}
                (FailurePolicy::Required, Ok(out)) => {
                    return Err(Error::Execution {
                        target: target.to_string(),
                        command: command.line.clone(),
                        status: Some(out.status),
                        output: out.output,
                    });
                }
                (FailurePolicy::BestEffort, Ok(out)) => {
                    tracing::debug!(
                        "{}: ignoring exit {} of `{}`: {}",
                        target,
                        out.status,
                        command,
                        out.output.trim()
                    );
                }
                (FailurePolicy::BestEffort, Err(e)) if e.is_execution() => {
                    tracing::warn!("{}: removal on {} did not run: {}", target, link, e);
                }
                (_, Err(e)) => return Err(e),
            }
        }
        Ok(())
    }
}

/// `ping -c <count> -W 1 [-s <size>] <destination>`
pub fn probe_command(destination: &str, count: u32, size: u32) -> String {
    let count = count.clamp(1, MAX_PROBE_COUNT);
    let mut command = format!("ping -c {} -W 1", count);
    if size > 0 {
        command.push_str(&format!(" -s {}", size));
    }
    command.push(' ');
    command.push_str(destination);
    command
}

/// A host name or address usable as a bare shell word.
fn validate_host(host: &str) -> Result<()> {
    let valid = !host.is_empty()
        && host.len() <= 253
        && !host.starts_with('-')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '_' | '%'));
    if valid {
        Ok(())
    } else {
        Err(Error::invalid(format!("invalid probe destination {:?}", host)))
    }
}

fn dedup<'a>(items: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(*item)).collect()
}

fn dedup_owned(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}
