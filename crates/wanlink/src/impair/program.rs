//! tc command programs.
//!
//! [`build`] turns an [`ImpairmentSpec`] into the ordered list of `tc`
//! command lines that replaces whatever qdisc hierarchy an interface has.
//! Building is pure; running the program is the controller's job.
//!
//! Two hierarchies are produced:
//!
//! ```text
//! Unshaped:  dev root -> netem (10:)
//! Shaped:    dev root -> tbf (1:) -> netem (10:, parent 1:1)
//! ```
//!
//! # Example
//!
//! ```
//! use wanlink::ImpairmentSpec;
//! use wanlink::impair::program;
//!
//! let spec = ImpairmentSpec::new().delay_ms(100).jitter_ms(10).loss_pct(1.0);
//! let program = program::build(&spec, "eth0");
//! let lines: Vec<_> = program.lines().collect();
//!
//! assert_eq!(lines, [
//!     "tc qdisc del dev eth0 root",
//!     "tc qdisc add dev eth0 root handle 10: netem delay 100ms 10ms distribution normal loss 1%",
//! ]);
//! ```

use std::fmt;

use super::spec::ImpairmentSpec;

/// Handle of the tbf qdisc in shaped mode.
pub const RATE_HANDLE: &str = "1:";
/// Class of the tbf qdisc the netem qdisc hangs from.
pub const RATE_CHILD_PARENT: &str = "1:1";
/// Handle of the netem qdisc.
pub const NETEM_HANDLE: &str = "10:";
/// tbf bucket size.
pub const TBF_BURST: &str = "32kbit";
/// tbf latency bound.
pub const TBF_LATENCY: &str = "400ms";

/// How the controller treats a non-zero exit of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The command must succeed; failure aborts the program.
    Required,
    /// Removal of a hierarchy that may not exist. Failures are expected
    /// and ignored.
    BestEffort,
}

/// One command line of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QdiscCommand {
    /// Shell command line.
    pub line: String,
    /// Failure handling.
    pub policy: FailurePolicy,
}

impl QdiscCommand {
    fn required(line: String) -> Self {
        Self {
            line,
            policy: FailurePolicy::Required,
        }
    }

    fn best_effort(line: String) -> Self {
        Self {
            line,
            policy: FailurePolicy::BestEffort,
        }
    }

    /// Whether a failure of this command is ignored.
    pub fn is_best_effort(&self) -> bool {
        self.policy == FailurePolicy::BestEffort
    }
}

impl fmt::Display for QdiscCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

/// Ordered list of commands for one interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QdiscProgram {
    commands: Vec<QdiscCommand>,
}

impl QdiscProgram {
    /// The commands in execution order.
    pub fn commands(&self) -> &[QdiscCommand] {
        &self.commands
    }

    /// The command lines in execution order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|c| c.line.as_str())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl<'a> IntoIterator for &'a QdiscProgram {
    type Item = &'a QdiscCommand;
    type IntoIter = std::slice::Iter<'a, QdiscCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

/// Build the program that replaces the qdisc hierarchy of `dev` with `spec`.
///
/// `dev` must already be canonical and validated.
pub fn build(spec: &ImpairmentSpec, dev: &str) -> QdiscProgram {
    let mut commands = vec![removal(dev)];

    let netem_head = match spec.rate_str() {
        Some(rate) => {
            commands.push(QdiscCommand::required(tbf_line(spec, dev, rate)));
            format!(
                "tc qdisc add dev {} parent {} handle {} netem",
                dev, RATE_CHILD_PARENT, NETEM_HANDLE
            )
        }
        None => format!("tc qdisc add dev {} root handle {} netem", dev, NETEM_HANDLE),
    };

    let mut parts = vec![netem_head];
    parts.extend(netem_fragments(spec));
    commands.push(QdiscCommand::required(parts.join(" ")));

    QdiscProgram { commands }
}

/// Program that only removes the hierarchy of `dev`.
pub fn clear_program(dev: &str) -> QdiscProgram {
    QdiscProgram {
        commands: vec![removal(dev)],
    }
}

/// Statistics dump for `dev`.
pub fn status_command(dev: &str) -> String {
    format!("tc -s qdisc show dev {}", dev)
}

fn removal(dev: &str) -> QdiscCommand {
    QdiscCommand::best_effort(format!("tc qdisc del dev {} root", dev))
}

fn tbf_line(spec: &ImpairmentSpec, dev: &str, rate: &str) -> String {
    let mut line = format!(
        "tc qdisc add dev {} root handle {} tbf rate {} burst {} latency {}",
        dev, RATE_HANDLE, rate, TBF_BURST, TBF_LATENCY
    );
    if let Some(overhead) = spec.effective_overhead() {
        line.push_str(&format!(" overhead {}", overhead));
    }
    if let Some(mpu) = spec.effective_mpu() {
        line.push_str(&format!(" mpu {}", mpu));
    }
    line
}

/// netem options in fixed order: delay, jitter, loss, corrupt, limit.
fn netem_fragments(spec: &ImpairmentSpec) -> Vec<String> {
    let mut parts = Vec::new();

    if spec.delay_ms > 0 {
        parts.push(format!("delay {}ms", spec.delay_ms));
        if spec.jitter_ms > 0 {
            parts.push(format!("{}ms distribution normal", spec.jitter_ms));
        }
    }
    if spec.loss_pct > 0.0 {
        parts.push(format!("loss {}%", spec.loss_pct));
    }
    if spec.ber_pct > 0.0 {
        parts.push(format!("corrupt {}%", spec.ber_pct));
    }
    if let Some(limit) = spec.effective_queue_limit() {
        parts.push(format!("limit {}", limit));
    }

    parts
}
