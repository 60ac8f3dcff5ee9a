//! Remote command execution.
//!
//! Every `tc` and `ip` command the engine issues goes through a
//! [`RemoteExecutor`], which runs a shell command line inside a named
//! target with the privileges needed to change qdiscs. Three backends are
//! provided:
//!
//! - [`LocalExecutor`] runs on the host itself
//! - [`NetnsExecutor`] enters a named network namespace (`ip netns exec`)
//! - [`DockerExecutor`] runs in a container (`docker exec --privileged`)
//!
//! # Example
//!
//! ```ignore
//! use wanlink::RemoteExecutor;
//! use wanlink::impair::executor::NetnsExecutor;
//!
//! let exec = NetnsExecutor::new().sudo(true);
//! let out = exec.execute("client1", "tc qdisc show dev eth0").await?;
//! if out.success() {
//!     print!("{}", out.output);
//! }
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;

use super::error::{Error, Result};

/// Runtime directory of named network namespaces.
pub const NETNS_RUN_DIR: &str = "/var/run/netns";

/// Exit status and combined output of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit status; -1 when the process was killed by a signal.
    pub status: i32,
    /// Stdout followed by stderr.
    pub output: String,
}

impl ExecOutput {
    pub fn new(status: i32, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
        }
    }

    /// Whether the command exited with status 0.
    #[inline]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Privileged command execution inside a target.
///
/// Implementations must be safe to share across tasks. A command that ran
/// and exited non-zero is an `Ok` with a non-zero status; only a failure to
/// run it at all is an error. An unknown target is [`Error::NotFound`],
/// any other transport failure an [`Error::Execution`] without a status.
pub trait RemoteExecutor: Send + Sync {
    /// Run `command` through a shell inside `target`.
    fn execute(
        &self,
        target: &str,
        command: &str,
    ) -> impl Future<Output = Result<ExecOutput>> + Send;
}

impl<T: RemoteExecutor> RemoteExecutor for Arc<T> {
    fn execute(
        &self,
        target: &str,
        command: &str,
    ) -> impl Future<Output = Result<ExecOutput>> + Send {
        (**self).execute(target, command)
    }
}

impl<T: RemoteExecutor> RemoteExecutor for &T {
    fn execute(
        &self,
        target: &str,
        command: &str,
    ) -> impl Future<Output = Result<ExecOutput>> + Send {
        (**self).execute(target, command)
    }
}

/// Spawn `program args...`, wait for it and collect its output.
pub(crate) async fn run(
    program: &str,
    args: &[&str],
    target: &str,
    command: &str,
) -> Result<ExecOutput> {
    tracing::debug!("{}: {}", target, command);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::transport(target, command, format!("{}: {}", program, e)))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(ExecOutput {
        status: output.status.code().unwrap_or(-1),
        output: text,
    })
}

// ============================================================================
// LocalExecutor
// ============================================================================

/// Runs commands on the host with `sh -c`. The target is only used for
/// logging and error messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl RemoteExecutor for LocalExecutor {
    async fn execute(&self, target: &str, command: &str) -> Result<ExecOutput> {
        run("sh", &["-c", command], target, command).await
    }
}

// ============================================================================
// NetnsExecutor
// ============================================================================

/// Runs commands inside named network namespaces with
/// `ip netns exec <target> sh -c <command>`.
#[derive(Debug, Clone, Default)]
pub struct NetnsExecutor {
    sudo: bool,
}

impl NetnsExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix commands with non-interactive `sudo`.
    pub fn sudo(mut self, enabled: bool) -> Self {
        self.sudo = enabled;
        self
    }

    fn namespace_path(target: &str) -> Option<PathBuf> {
        if target.is_empty() || target == "." || target == ".." || target.contains('/') {
            return None;
        }
        Some(PathBuf::from(NETNS_RUN_DIR).join(target))
    }
}

impl RemoteExecutor for NetnsExecutor {
    async fn execute(&self, target: &str, command: &str) -> Result<ExecOutput> {
        let exists = match Self::namespace_path(target) {
            Some(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        };
        if !exists {
            return Err(Error::NotFound {
                target: target.to_string(),
            });
        }

        let args = ["netns", "exec", target, "sh", "-c", command];
        if self.sudo {
            let mut sudo_args = vec!["-n", "ip"];
            sudo_args.extend(args);
            run("sudo", &sudo_args, target, command).await
        } else {
            run("ip", &args, target, command).await
        }
    }
}

// ============================================================================
// DockerExecutor
// ============================================================================

/// Runs commands inside containers with
/// `docker exec --privileged <target> sh -lc <command>`.
#[derive(Debug, Clone)]
pub struct DockerExecutor {
    binary: String,
}

impl Default for DockerExecutor {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }
}

impl DockerExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different engine CLI (`podman`, a full path).
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// The engine CLI in use.
    pub fn binary_name(&self) -> &str {
        &self.binary
    }
}

impl RemoteExecutor for DockerExecutor {
    async fn execute(&self, target: &str, command: &str) -> Result<ExecOutput> {
        let out = run(
            &self.binary,
            &["exec", "--privileged", target, "sh", "-lc", command],
            target,
            command,
        )
        .await?;

        if !out.success() && out.output.contains("No such container") {
            return Err(Error::NotFound {
                target: target.to_string(),
            });
        }
        Ok(out)
    }
}
