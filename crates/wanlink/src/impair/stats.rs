//! qdisc statistics parsing.
//!
//! [`parse`] reads the text printed by `tc -s qdisc show dev <if>` and
//! builds a [`LinkStatus`]. Kernel and iproute2 versions differ in what they
//! print (`overlimits`, `requeues` and `qlen` are often missing), so every
//! field is pulled out by its own extractor and a field that is not found
//! simply stays at its default.
//!
//! # Example
//!
//! ```
//! use wanlink::impair::stats;
//!
//! let text = "\
//! qdisc netem 10: root refcnt 2 limit 1000 delay 50ms  10ms loss 2%
//!  Sent 14500 bytes 97 pkt (dropped 3, overlimits 0 requeues 0)
//!  backlog 0b 0p requeues 0
//! ";
//!
//! let status = stats::parse(text);
//! assert!(status.active);
//! assert_eq!(status.delay_ms, Some(50));
//! assert_eq!(status.jitter_ms, Some(10));
//! assert_eq!(status.drops.pct, 3.0);
//! ```

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use winnow::ascii::{digit1, space0, space1};
use winnow::combinator::{alt, opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{one_of, take_till, take_while};

/// Result type for the text parsers in this module.
pub type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

/// Transmit counters of the root qdisc.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStats {
    /// Bytes sent.
    pub bytes: u64,
    /// Packets sent.
    pub frames: u64,
}

/// Drop counters of the root qdisc.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DropStats {
    /// Packets dropped.
    pub total: u64,
    /// Dropped share of all packets offered, in percent, 3 decimals.
    pub pct: f64,
    /// Packets that hit the rate limit.
    pub overlimits: u64,
    /// Packets requeued.
    pub requeues: u64,
}

/// Backlog of the root qdisc.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Bytes queued.
    pub bytes: u64,
    /// Packets queued.
    pub frames: u64,
    /// Queue length, when printed.
    pub qlen: Option<u64>,
}

/// Observed impairment state and counters of one interface.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LinkStatus {
    /// A netem or tbf qdisc is installed.
    pub active: bool,
    pub delay_ms: Option<u32>,
    pub jitter_ms: Option<u32>,
    pub loss_pct: Option<f64>,
    pub ber_pct: Option<f64>,
    /// tbf rate, lower-cased (`10mbit`).
    pub rate: Option<String>,
    pub queue_limit: Option<u32>,
    pub tx: TxStats,
    pub drops: DropStats,
    pub queue: QueueStats,
}

impl LinkStatus {
    /// Status of an interface without a managed qdisc.
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Whether the interface is shaped by tbf.
    pub fn is_shaped(&self) -> bool {
        self.rate.is_some()
    }
}

// An inactive status carries nothing but the flag.
impl Serialize for LinkStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if !self.active {
            let mut s = serializer.serialize_struct("LinkStatus", 1)?;
            s.serialize_field("active", &false)?;
            return s.end();
        }

        let mut s = serializer.serialize_struct("LinkStatus", 10)?;
        s.serialize_field("active", &true)?;
        s.serialize_field("delay_ms", &self.delay_ms)?;
        s.serialize_field("jitter_ms", &self.jitter_ms)?;
        s.serialize_field("loss_pct", &self.loss_pct)?;
        s.serialize_field("ber_pct", &self.ber_pct)?;
        s.serialize_field("rate", &self.rate)?;
        s.serialize_field("queue_limit", &self.queue_limit)?;
        s.serialize_field("tx", &self.tx)?;
        s.serialize_field("drops", &self.drops)?;
        s.serialize_field("queue", &self.queue)?;
        s.end()
    }
}

/// Parse `tc -s qdisc show` output. Never fails.
pub fn parse(text: &str) -> LinkStatus {
    if !has_managed_qdisc(text) {
        return LinkStatus::inactive();
    }

    let delay = delay_jitter(text);
    let (sent_bytes, sent_frames) = sent(text).unwrap_or((0, 0));
    let dropped = dropped(text).unwrap_or(0);
    let (backlog_bytes, backlog_frames) = backlog(text).unwrap_or((0, 0));

    LinkStatus {
        active: true,
        delay_ms: delay.map(|(d, _)| d),
        jitter_ms: delay.and_then(|(_, j)| j),
        loss_pct: loss(text),
        ber_pct: corrupt(text),
        rate: rate(text),
        queue_limit: queue_limit(text),
        tx: TxStats {
            bytes: sent_bytes,
            frames: sent_frames,
        },
        drops: DropStats {
            total: dropped,
            pct: drop_pct(sent_frames, dropped),
            overlimits: overlimits(text).unwrap_or(0),
            requeues: requeues(text).unwrap_or(0),
        },
        queue: QueueStats {
            bytes: backlog_bytes,
            frames: backlog_frames,
            qlen: qlen(text),
        },
    }
}

/// Dropped share of offered packets, rounded to 3 decimals; 0.0 when
/// nothing was offered.
pub fn drop_pct(sent_frames: u64, dropped: u64) -> f64 {
    let offered = sent_frames.saturating_add(dropped);
    if offered == 0 {
        return 0.0;
    }
    let pct = dropped as f64 / offered as f64 * 100.0;
    (pct * 1000.0).round() / 1000.0
}

// ============================================================================
// Field extractors
// ============================================================================

/// A netem or tbf qdisc line is present.
pub fn has_managed_qdisc(text: &str) -> bool {
    qdisc_lines(text).any(|(kind, _)| kind == "netem" || kind == "tbf")
}

/// Base delay and optional jitter, in milliseconds.
pub fn delay_jitter(text: &str) -> Option<(u32, Option<u32>)> {
    find_keyword(text, "delay", |input| {
        let delay = preceded(space1, duration_ms).parse_next(input)?;
        let jitter = opt(preceded(space1, duration_ms)).parse_next(input)?;
        Ok((delay, jitter))
    })
}

/// Random loss percentage.
pub fn loss(text: &str) -> Option<f64> {
    find_keyword(text, "loss", percent)
}

/// Corruption percentage.
pub fn corrupt(text: &str) -> Option<f64> {
    find_keyword(text, "corrupt", percent)
}

/// tbf rate token, taken from the tbf line only.
pub fn rate(text: &str) -> Option<String> {
    qdisc_lines(text)
        .filter(|(kind, _)| *kind == "tbf")
        .find_map(|(_, line)| {
            find_keyword(line, "rate", |input| {
                preceded(space1, take_till(1.., char::is_whitespace)).parse_next(input)
            })
        })
        .map(str::to_ascii_lowercase)
}

/// netem queue limit in packets; the netem line wins over other lines.
pub fn queue_limit(text: &str) -> Option<u32> {
    qdisc_lines(text)
        .filter(|(kind, _)| *kind == "netem")
        .find_map(|(_, line)| find_keyword(line, "limit", packet_count))
        .or_else(|| find_keyword(text, "limit", packet_count))
}

/// `Sent <bytes> bytes <pkts> pkt` of the first (root) qdisc.
pub fn sent(text: &str) -> Option<(u64, u64)> {
    find_keyword(text, "Sent", |input| {
        let bytes = preceded(space1, number_u64).parse_next(input)?;
        (space1, "bytes", space1).parse_next(input)?;
        let frames = number_u64.parse_next(input)?;
        (space1, "pkt").parse_next(input)?;
        Ok((bytes, frames))
    })
}

/// Dropped packet count.
pub fn dropped(text: &str) -> Option<u64> {
    counter(text, "dropped")
}

/// Overlimit count.
pub fn overlimits(text: &str) -> Option<u64> {
    counter(text, "overlimits")
}

/// Requeue count.
pub fn requeues(text: &str) -> Option<u64> {
    counter(text, "requeues")
}

/// Backlog as (bytes, packets). Sizes printed as `12Kb`/`3Mb` are scaled
/// by 1024.
pub fn backlog(text: &str) -> Option<(u64, u64)> {
    find_keyword(text, "backlog", |input| {
        let bytes = preceded(space1, size_bytes).parse_next(input)?;
        let frames = preceded(space1, number_u64).parse_next(input)?;
        (space0, "p").parse_next(input)?;
        Ok((bytes, frames))
    })
}

/// Queue length.
pub fn qlen(text: &str) -> Option<u64> {
    counter(text, "qlen")
}

// ============================================================================
// Parser primitives
// ============================================================================

fn counter(text: &str, keyword: &str) -> Option<u64> {
    find_keyword(text, keyword, |input| {
        preceded(space1, number_u64).parse_next(input)
    })
}

/// Yield `(kind, line)` for every `qdisc <kind> ...` line.
fn qdisc_lines(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.lines().filter_map(|line| {
        let mut input = line.trim_start();
        let kind: PResult<&str> =
            preceded(("qdisc", space1), take_till(1.., char::is_whitespace)).parse_next(&mut input);
        Some((kind.ok()?, line))
    })
}

/// Run `parser` right after each whole-word occurrence of `keyword` and
/// return the first success.
fn find_keyword<'a, O>(
    text: &'a str,
    keyword: &str,
    mut parser: impl FnMut(&mut &'a str) -> PResult<O>,
) -> Option<O> {
    let mut offset = 0;
    while let Some(pos) = text[offset..].find(keyword) {
        let start = offset + pos;
        offset = start + keyword.len();

        let boundary = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'));
        if !boundary {
            continue;
        }

        let mut input = &text[offset..];
        if let Ok(value) = parser(&mut input) {
            return Some(value);
        }
    }
    None
}

fn number_u64(input: &mut &str) -> PResult<u64> {
    digit1.try_map(str::parse::<u64>).parse_next(input)
}

fn decimal(input: &mut &str) -> PResult<f64> {
    take_while(1.., |c: char| c.is_ascii_digit() || c == '.')
        .try_map(str::parse::<f64>)
        .parse_next(input)
}

fn packet_count(input: &mut &str) -> PResult<u32> {
    let n = preceded(space1, number_u64).parse_next(input)?;
    word_end(input)?;
    u32::try_from(n).map_err(|_| ErrMode::Backtrack(ContextError::new()))
}

fn percent(input: &mut &str) -> PResult<f64> {
    let value = preceded(space1, decimal).parse_next(input)?;
    "%".parse_next(input)?;
    Ok(value)
}

/// `50ms`, `1.5s`, `500us` -> whole milliseconds.
fn duration_ms(input: &mut &str) -> PResult<u32> {
    let value = decimal.parse_next(input)?;
    let scale = alt(("us".value(0.001), "ms".value(1.0), "s".value(1000.0))).parse_next(input)?;
    word_end(input)?;
    Ok((value * scale).round() as u32)
}

/// `1514b`, `12Kb`, `3Mb`, `7` -> bytes.
fn size_bytes(input: &mut &str) -> PResult<u64> {
    let value = number_u64.parse_next(input)?;
    let scale = opt(one_of(['K', 'k', 'M', 'm', 'G', 'g']))
        .map(|prefix| match prefix {
            Some('K' | 'k') => 1 << 10,
            Some('M' | 'm') => 1 << 20,
            Some('G' | 'g') => 1 << 30,
            _ => 1,
        })
        .parse_next(input)?;
    opt(one_of(['b', 'B'])).parse_next(input)?;
    value
        .checked_mul(scale)
        .ok_or_else(|| ErrMode::Backtrack(ContextError::new()))
}

/// The next char, if any, ends the current token.
fn word_end(input: &mut &str) -> PResult<()> {
    match input.chars().next() {
        Some(c) if c.is_alphanumeric() => Err(ErrMode::Backtrack(ContextError::new())),
        _ => Ok(()),
    }
}
