//! Target registries.
//!
//! A [`TargetRegistry`] answers two questions: which targets exist right
//! now, and which interfaces each of them has. The telemetry streamer asks
//! again on every cycle, so targets may come and go between snapshots.
//!
//! # Example
//!
//! ```ignore
//! use wanlink::impair::executor::NetnsExecutor;
//! use wanlink::impair::registry::{self, NetnsRegistry};
//!
//! let registry = NetnsRegistry::new(NetnsExecutor::new());
//! for link in registry::discover(&registry).await? {
//!     println!("{}", link);
//! }
//! ```

use std::future::Future;
use std::io;
use std::sync::Arc;

use super::discovery::{self, InterfaceInfo};
use super::error::{Error, Result};
use super::executor::{self, DockerExecutor, NETNS_RUN_DIR, RemoteExecutor};
use super::interface_ref::InterfaceRef;

/// Source of targets and their interfaces.
pub trait TargetRegistry: Send + Sync {
    /// Currently known target identifiers, sorted.
    fn list_targets(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Non-loopback interfaces of `target`, sorted by name.
    fn list_interfaces(
        &self,
        target: &str,
    ) -> impl Future<Output = Result<Vec<InterfaceInfo>>> + Send;
}

impl<T: TargetRegistry> TargetRegistry for Arc<T> {
    fn list_targets(&self) -> impl Future<Output = Result<Vec<String>>> + Send {
        (**self).list_targets()
    }

    fn list_interfaces(
        &self,
        target: &str,
    ) -> impl Future<Output = Result<Vec<InterfaceInfo>>> + Send {
        (**self).list_interfaces(target)
    }
}

/// List every (target, interface) pair.
///
/// A failure to list targets is returned; a target whose interfaces cannot
/// be listed is skipped.
pub async fn discover<R: TargetRegistry>(registry: &R) -> Result<Vec<InterfaceRef>> {
    let mut links = Vec::new();
    for target in registry.list_targets().await? {
        match registry.list_interfaces(&target).await {
            Ok(infos) => {
                links.extend(infos.iter().map(|i| InterfaceRef::new(target.as_str(), &i.iface)));
            }
            Err(e) => tracing::debug!("{}: skipping, cannot list interfaces: {}", target, e),
        }
    }
    Ok(links)
}

// ============================================================================
// StaticRegistry
// ============================================================================

/// A fixed list of targets reached through an executor.
#[derive(Debug, Clone)]
pub struct StaticRegistry<E> {
    exec: E,
    targets: Vec<String>,
}

impl<E: RemoteExecutor> StaticRegistry<E> {
    pub fn new<I, S>(exec: E, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut targets: Vec<String> = targets.into_iter().map(Into::into).collect();
        targets.sort();
        targets.dedup();
        Self { exec, targets }
    }
}

impl<E: RemoteExecutor> TargetRegistry for StaticRegistry<E> {
    async fn list_targets(&self) -> Result<Vec<String>> {
        Ok(self.targets.clone())
    }

    async fn list_interfaces(&self, target: &str) -> Result<Vec<InterfaceInfo>> {
        if !self.targets.iter().any(|t| t == target) {
            return Err(Error::NotFound {
                target: target.to_string(),
            });
        }
        discovery::interfaces(&self.exec, target).await
    }
}

// ============================================================================
// NetnsRegistry
// ============================================================================

/// Named network namespaces under `/var/run/netns`.
#[derive(Debug, Clone)]
pub struct NetnsRegistry<E> {
    exec: E,
}

impl<E: RemoteExecutor> NetnsRegistry<E> {
    pub fn new(exec: E) -> Self {
        Self { exec }
    }
}

impl<E: RemoteExecutor> TargetRegistry for NetnsRegistry<E> {
    async fn list_targets(&self) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(NETNS_RUN_DIR).await {
            Ok(dir) => dir,
            // No runtime directory means no namespaces
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn list_interfaces(&self, target: &str) -> Result<Vec<InterfaceInfo>> {
        discovery::interfaces(&self.exec, target).await
    }
}

// ============================================================================
// DockerRegistry
// ============================================================================

/// Running containers, optionally restricted to those carrying a label.
#[derive(Debug, Clone, Default)]
pub struct DockerRegistry {
    exec: DockerExecutor,
    label: Option<String>,
}

impl DockerRegistry {
    pub fn new(exec: DockerExecutor) -> Self {
        Self { exec, label: None }
    }

    /// Only list containers with this label (`key` or `key=value`).
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn ps_args(&self) -> Vec<String> {
        let mut args = vec!["ps".to_string(), "--format".to_string(), "{{.Names}}".to_string()];
        if let Some(label) = &self.label {
            args.push("--filter".to_string());
            args.push(format!("label={}", label));
        }
        args
    }
}

impl TargetRegistry for DockerRegistry {
    async fn list_targets(&self) -> Result<Vec<String>> {
        let args = self.ps_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = args.join(" ");

        let out = executor::run(self.exec.binary_name(), &args, "host", &command).await?;
        if !out.success() {
            return Err(Error::Execution {
                target: "host".to_string(),
                command,
                status: Some(out.status),
                output: out.output,
            });
        }
        Ok(parse_names(&out.output))
    }

    async fn list_interfaces(&self, target: &str) -> Result<Vec<InterfaceInfo>> {
        discovery::interfaces(&self.exec, target).await
    }
}

/// One name per line, blanks dropped, sorted and deduplicated.
fn parse_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    names.sort();
    names.dedup();
    names
}
