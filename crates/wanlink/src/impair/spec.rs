//! Declarative impairment specification.
//!
//! An [`ImpairmentSpec`] describes the desired state of one link: netem
//! delay, jitter, loss and corruption, plus optional tbf rate shaping. Every
//! field defaults to "off", so a default spec clears impairments while still
//! installing a passthrough netem qdisc.
//!
//! # Example
//!
//! ```
//! use wanlink::ImpairmentSpec;
//!
//! // A lossy satellite hop capped at 10 Mbit/s
//! let spec = ImpairmentSpec::new()
//!     .delay_ms(300)
//!     .jitter_ms(30)
//!     .loss_pct(1.0)
//!     .rate("10mbit")
//!     .queue_limit(1000);
//!
//! assert!(spec.validate().is_ok());
//! assert!(spec.is_shaped());
//! ```

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use crate::util::rate;

/// Impairment applied to one interface.
///
/// Zero and `None` both mean "not set": the program builder omits the
/// corresponding fragment instead of emitting `loss 0%` or `mpu 0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpairmentSpec {
    /// Added one-way delay in milliseconds.
    pub delay_ms: u32,
    /// Delay variation in milliseconds (normal distribution). Ignored
    /// without a delay.
    pub jitter_ms: u32,
    /// Random packet loss, 0-100%.
    pub loss_pct: f64,
    /// Packet corruption (bit error) probability, 0-100%.
    pub ber_pct: f64,
    /// tbf rate, e.g. `10mbit`. Presence switches the link to shaped mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<String>,
    /// netem queue limit in packets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_limit: Option<u32>,
    /// Per-packet framing overhead in bytes for tbf accounting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overhead: Option<u32>,
    /// Minimum packet unit in bytes for tbf accounting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpu: Option<u32>,
}

impl ImpairmentSpec {
    /// Create an empty spec (no impairment).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the added delay in milliseconds.
    pub fn delay_ms(mut self, ms: u32) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Set the delay jitter in milliseconds.
    pub fn jitter_ms(mut self, ms: u32) -> Self {
        self.jitter_ms = ms;
        self
    }

    /// Set the packet loss percentage.
    pub fn loss_pct(mut self, percent: f64) -> Self {
        self.loss_pct = percent;
        self
    }

    /// Set the corruption percentage.
    pub fn ber_pct(mut self, percent: f64) -> Self {
        self.ber_pct = percent;
        self
    }

    /// Set the tbf rate (e.g. `"10mbit"`).
    pub fn rate(mut self, rate: impl Into<String>) -> Self {
        self.rate = Some(rate.into());
        self
    }

    /// Set the netem queue limit in packets.
    pub fn queue_limit(mut self, packets: u32) -> Self {
        self.queue_limit = Some(packets);
        self
    }

    /// Set the tbf framing overhead in bytes.
    pub fn overhead(mut self, bytes: u32) -> Self {
        self.overhead = Some(bytes);
        self
    }

    /// Set the tbf minimum packet unit in bytes.
    pub fn mpu(mut self, bytes: u32) -> Self {
        self.mpu = Some(bytes);
        self
    }

    /// Whether a rate-shaping qdisc will be installed.
    pub fn is_shaped(&self) -> bool {
        self.rate_str().is_some()
    }

    /// The rate string, trimmed, if set and non-empty.
    pub fn rate_str(&self) -> Option<&str> {
        self.rate
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    /// Queue limit, if set and non-zero.
    pub fn effective_queue_limit(&self) -> Option<u32> {
        self.queue_limit.filter(|&n| n > 0)
    }

    /// Framing overhead, if set and non-zero.
    pub fn effective_overhead(&self) -> Option<u32> {
        self.overhead.filter(|&n| n > 0)
    }

    /// Minimum packet unit, if set and non-zero.
    pub fn effective_mpu(&self) -> Option<u32> {
        self.mpu.filter(|&n| n > 0)
    }

    /// Check value ranges before the spec is turned into commands.
    ///
    /// Combinations that make no sense (jitter without delay, mpu without a
    /// rate) are accepted; the builder simply leaves them out.
    pub fn validate(&self) -> Result<()> {
        check_percent("loss_pct", self.loss_pct)?;
        check_percent("ber_pct", self.ber_pct)?;

        if let Some(r) = self.rate_str() {
            rate::parse_rate(r).map_err(|e| Error::invalid(e.to_string()))?;
        }

        Ok(())
    }
}

fn check_percent(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(Error::invalid(format!(
            "{} must be within 0-100, got {}",
            field, value
        )));
    }
    Ok(())
}
