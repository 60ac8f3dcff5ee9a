//! Common test utilities for integration tests.
//!
//! Provides a scripted `StubExecutor` and `StubRegistry` for driving the
//! controller and streamer without a kernel, plus `TestNamespace` and
//! `require_root!` for the live namespace tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::process::Command;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use wanlink::impair::discovery::InterfaceInfo;
use wanlink::impair::executor::ExecOutput;
use wanlink::{Error, RemoteExecutor, Result, TargetRegistry};

/// Kernel output for a shaped link: tbf 10mbit over netem with 50ms delay,
/// 2% loss and a 1000 packet limit.
pub const SHAPED_QDISC: &str = "\
qdisc tbf 1: root refcnt 2 rate 10Mbit burst 4Kb lat 400ms
 Sent 982340 bytes 1204 pkt (dropped 12, overlimits 57 requeues 0)
 backlog 0b 0p requeues 0
qdisc netem 10: parent 1:1 limit 1000 delay 50ms loss 2%
 Sent 982340 bytes 1204 pkt (dropped 12, overlimits 0 requeues 0)
 backlog 0b 0p requeues 0
";

/// Kernel output for a link without a managed qdisc.
pub const CLEAN_QDISC: &str = "\
qdisc noqueue 0: root refcnt 2
 Sent 0 bytes 0 pkt (dropped 0, overlimits 0 requeues 0)
 backlog 0b 0p requeues 0
";

// ============================================================================
// StubExecutor
// ============================================================================

/// A recorded `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub target: String,
    pub command: String,
}

#[derive(Debug, Clone)]
enum Reply {
    Output(ExecOutput),
    Transport(String),
}

#[derive(Debug, Clone)]
struct Rule {
    target: Option<String>,
    prefix: String,
    reply: Reply,
}

/// Executor answering from scripted rules and recording every call.
///
/// The last matching rule wins; unmatched commands succeed with no output.
#[derive(Debug, Default)]
pub struct StubExecutor {
    rules: Vec<Rule>,
    unknown: HashSet<String>,
    latency: Duration,
    calls: Mutex<Vec<Call>>,
}

impl StubExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands in `target` starting with `prefix`.
    pub fn respond(mut self, target: &str, prefix: &str, status: i32, output: &str) -> Self {
        self.rules.push(Rule {
            target: Some(target.to_string()),
            prefix: prefix.to_string(),
            reply: Reply::Output(ExecOutput::new(status, output)),
        });
        self
    }

    /// Answer commands starting with `prefix` in every target.
    pub fn respond_all(mut self, prefix: &str, status: i32, output: &str) -> Self {
        self.rules.push(Rule {
            target: None,
            prefix: prefix.to_string(),
            reply: Reply::Output(ExecOutput::new(status, output)),
        });
        self
    }

    /// Fail commands in `target` starting with `prefix` before they run.
    pub fn transport_failure(mut self, target: &str, prefix: &str) -> Self {
        self.rules.push(Rule {
            target: Some(target.to_string()),
            prefix: prefix.to_string(),
            reply: Reply::Transport("connection reset".to_string()),
        });
        self
    }

    /// Treat `target` as nonexistent.
    pub fn unknown_target(mut self, target: &str) -> Self {
        self.unknown.insert(target.to_string());
        self
    }

    /// Sleep this long (on the tokio clock) before answering.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command).collect()
    }

    pub fn commands_for(&self, target: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.target == target)
            .map(|c| c.command)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl RemoteExecutor for StubExecutor {
    async fn execute(&self, target: &str, command: &str) -> Result<ExecOutput> {
        self.calls.lock().unwrap().push(Call {
            target: target.to_string(),
            command: command.to_string(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.unknown.contains(target) {
            return Err(Error::NotFound {
                target: target.to_string(),
            });
        }

        let rule = self.rules.iter().rev().find(|r| {
            r.target.as_deref().is_none_or(|t| t == target) && command.starts_with(&r.prefix)
        });

        match rule.map(|r| &r.reply) {
            Some(Reply::Output(out)) => Ok(out.clone()),
            Some(Reply::Transport(reason)) => {
                Err(Error::transport(target, command, reason.as_str()))
            }
            None => Ok(ExecOutput::default()),
        }
    }
}

// ============================================================================
// StubRegistry
// ============================================================================

/// Registry with a mutable target table.
#[derive(Debug, Default)]
pub struct StubRegistry {
    targets: Mutex<Vec<(String, Vec<String>)>>,
    broken: Mutex<HashSet<String>>,
    listing_fails: AtomicBool,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a target and its interfaces.
    pub fn set(&self, target: &str, ifaces: &[&str]) {
        let mut targets = self.targets.lock().unwrap();
        targets.retain(|(t, _)| t != target);
        targets.push((
            target.to_string(),
            ifaces.iter().map(|i| i.to_string()).collect(),
        ));
        targets.sort();
    }

    pub fn remove(&self, target: &str) {
        self.targets.lock().unwrap().retain(|(t, _)| t != target);
    }

    /// Make interface listing fail for `target`.
    pub fn break_target(&self, target: &str) {
        self.broken.lock().unwrap().insert(target.to_string());
    }

    /// Make target listing fail (or succeed again).
    pub fn fail_listing(&self, fail: bool) {
        self.listing_fails.store(fail, Ordering::SeqCst);
    }
}

impl TargetRegistry for StubRegistry {
    async fn list_targets(&self) -> Result<Vec<String>> {
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(Error::transport("host", "docker ps", "daemon not running"));
        }
        Ok(self
            .targets
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect())
    }

    async fn list_interfaces(&self, target: &str) -> Result<Vec<InterfaceInfo>> {
        if self.broken.lock().unwrap().contains(target) {
            return Err(Error::transport(target, "ip -o link show", "exec failed"));
        }
        let targets = self.targets.lock().unwrap();
        let (_, ifaces) = targets
            .iter()
            .find(|(t, _)| t == target)
            .ok_or_else(|| Error::NotFound {
                target: target.to_string(),
            })?;
        Ok(ifaces.iter().map(InterfaceInfo::new).collect())
    }
}

// ============================================================================
// Live namespaces
// ============================================================================

/// Global counter for unique namespace names.
static NAMESPACE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate a unique namespace name for this test.
fn unique_ns_name(prefix: &str) -> String {
    let id = NAMESPACE_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("wanlink-{}-{}-{}", prefix, std::process::id(), id)
}

/// A network namespace with a dummy interface, deleted on drop.
pub struct TestNamespace {
    name: String,
}

impl TestNamespace {
    /// Create a namespace holding an up `dummy0`.
    pub fn with_dummy(prefix: &str) -> std::io::Result<Self> {
        let ns = Self {
            name: unique_ns_name(prefix),
        };
        run("ip", &["netns", "add", ns.name.as_str()])?;
        ns.exec(&["ip", "link", "add", "dummy0", "type", "dummy"])?;
        ns.exec(&["ip", "link", "set", "dummy0", "up"])?;
        Ok(ns)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run a command inside the namespace.
    pub fn exec(&self, args: &[&str]) -> std::io::Result<()> {
        let mut full = vec!["netns", "exec", self.name.as_str()];
        full.extend_from_slice(args);
        run("ip", &full)
    }
}

impl Drop for TestNamespace {
    fn drop(&mut self) {
        let _ = Command::new("ip")
            .args(["netns", "del", &self.name])
            .status();
    }
}

fn run(program: &str, args: &[&str]) -> std::io::Result<()> {
    let status = Command::new(program).args(args).status()?;
    if !status.success() {
        return Err(std::io::Error::other(format!(
            "{} {:?} exited with {}",
            program, args, status
        )));
    }
    Ok(())
}

/// Check if running as root.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Skip the test if not running as root.
#[macro_export]
macro_rules! require_root {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return;
        }
    };
}
