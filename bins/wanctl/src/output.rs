//! Text and JSON rendering for wanctl results.

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::Serialize;
use wanlink::impair::controller::{ProbeReport, StatusEntry};
use wanlink::impair::discovery::InterfaceInfo;
use wanlink::impair::telemetry::Snapshot;
use wanlink::{LinkStatus, StatusReport};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Output options.
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl OutputOptions {
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

/// Something wanctl can print.
pub trait Printable {
    /// Print as plain text.
    fn print_text<W: Write>(&self, w: &mut W) -> io::Result<()>;

    /// Convert to JSON value.
    fn to_json(&self) -> serde_json::Value;
}

/// Print one item to stdout in the selected format.
pub fn print<T: Printable>(item: &T, opts: &OutputOptions) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    match opts.format {
        OutputFormat::Text => item.print_text(&mut stdout),
        OutputFormat::Json => write_json(&mut stdout, &item.to_json(), opts.pretty),
    }
}

/// Print a list of items to stdout in the selected format.
pub fn print_all<T: Printable>(items: &[T], opts: &OutputOptions) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    match opts.format {
        OutputFormat::Text => {
            for item in items {
                item.print_text(&mut stdout)?;
            }
            Ok(())
        }
        OutputFormat::Json => {
            let json: Vec<_> = items.iter().map(Printable::to_json).collect();
            write_json(&mut stdout, &serde_json::Value::Array(json), opts.pretty)
        }
    }
}

pub fn write_json<W: Write, T: Serialize>(w: &mut W, value: &T, pretty: bool) -> io::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *w, value)?;
    } else {
        serde_json::to_writer(&mut *w, value)?;
    }
    writeln!(w)
}

fn to_value<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of a write operation.
#[derive(Debug, Serialize)]
pub struct Applied {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub touched: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl Applied {
    pub fn touched(keys: Vec<String>) -> Self {
        Self {
            ok: true,
            touched: Some(keys),
            count: None,
        }
    }

    pub fn count(count: usize) -> Self {
        Self {
            ok: true,
            touched: None,
            count: Some(count),
        }
    }

    pub fn ok() -> Self {
        Self {
            ok: true,
            touched: None,
            count: None,
        }
    }
}

impl Printable for Applied {
    fn print_text<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match (&self.touched, self.count) {
            (Some(keys), _) => writeln!(w, "touched: {}", keys.join(" ")),
            (None, Some(count)) => writeln!(w, "applied {} item(s)", count),
            (None, None) => writeln!(w, "ok"),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        to_value(self)
    }
}

impl Printable for StatusReport {
    fn print_text<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "{}  ", self.key())?;
        print_summary(w, &self.summary)
    }

    fn to_json(&self) -> serde_json::Value {
        to_value(self)
    }
}

fn print_summary<W: Write>(w: &mut W, s: &LinkStatus) -> io::Result<()> {
    if !s.active {
        return writeln!(w, "no impairment");
    }

    let mut parts = Vec::new();
    if let Some(d) = s.delay_ms {
        parts.push(format!("delay {}ms", d));
    }
    if let Some(j) = s.jitter_ms {
        parts.push(format!("jitter {}ms", j));
    }
    if let Some(l) = s.loss_pct {
        parts.push(format!("loss {}%", l));
    }
    if let Some(b) = s.ber_pct {
        parts.push(format!("corrupt {}%", b));
    }
    if let Some(r) = &s.rate {
        parts.push(format!("rate {}", r));
    }
    if let Some(q) = s.queue_limit {
        parts.push(format!("limit {}", q));
    }
    if parts.is_empty() {
        parts.push("passthrough".to_string());
    }
    writeln!(w, "{}", parts.join(" "))?;

    writeln!(
        w,
        "    sent {} bytes {} pkt dropped {} ({}%) overlimits {} requeues {}",
        s.tx.bytes, s.tx.frames, s.drops.total, s.drops.pct, s.drops.overlimits, s.drops.requeues
    )?;
    write!(w, "    backlog {}b {}p", s.queue.bytes, s.queue.frames)?;
    if let Some(qlen) = s.queue.qlen {
        write!(w, " qlen {}", qlen)?;
    }
    writeln!(w)
}

/// Batch status results keyed by `target:interface`.
pub struct StatusMap(pub BTreeMap<String, StatusEntry>);

impl Printable for StatusMap {
    fn print_text<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for (key, entry) in &self.0 {
            match entry {
                StatusEntry::Report(report) => report.print_text(w)?,
                StatusEntry::Error { error } => writeln!(w, "{}  error: {}", key, error)?,
            }
        }
        Ok(())
    }

    fn to_json(&self) -> serde_json::Value {
        to_value(&self.0)
    }
}

impl Printable for Snapshot {
    fn print_text<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "--- cycle {} ({} links)", self.cycle, self.len())?;
        for report in self.links.values() {
            report.print_text(w)?;
        }
        Ok(())
    }

    fn to_json(&self) -> serde_json::Value {
        to_value(self)
    }
}

impl Printable for ProbeReport {
    fn print_text<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "{}", self.out)?;
        if !self.out.ends_with('\n') && !self.out.is_empty() {
            writeln!(w)?;
        }
        if !self.ok {
            writeln!(w, "probe failed (exit {})", self.rc)?;
        }
        Ok(())
    }

    fn to_json(&self) -> serde_json::Value {
        to_value(self)
    }
}

/// A target name.
pub struct Target(pub String);

impl Printable for Target {
    fn print_text<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "{}", self.0)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::String(self.0.clone())
    }
}

impl Printable for InterfaceInfo {
    fn print_text<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{:<16} {:<20} {}",
            self.iface,
            self.ipv4.as_deref().unwrap_or("-"),
            self.mac.as_deref().unwrap_or("-")
        )
    }

    fn to_json(&self) -> serde_json::Value {
        to_value(self)
    }
}

/// An interface together with the target it lives in.
#[derive(Debug, Serialize)]
pub struct Port {
    pub name: String,
    #[serde(flatten)]
    pub info: InterfaceInfo,
}

impl Printable for Port {
    fn print_text<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "{:<20} ", self.name)?;
        self.info.print_text(w)
    }

    fn to_json(&self) -> serde_json::Value {
        to_value(self)
    }
}
