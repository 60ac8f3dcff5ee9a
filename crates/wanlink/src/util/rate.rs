//! Rate string utilities.
//!
//! tc accepts rates such as `10mbit`, `512kbit`, `1gbit` or `125kbps`.
//! [`parse_rate`] checks such strings before they reach a command line.
//!
//! # Example
//!
//! ```
//! use wanlink::util::rate;
//!
//! assert_eq!(rate::parse_rate("10mbit").unwrap(), 1_250_000);
//! assert!(rate::parse_rate("10mbit; reboot").is_err());
//! ```

/// Error returned for a malformed rate string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid rate {0:?}")]
pub struct RateError(pub String);

/// Parse a tc rate string into bytes per second.
///
/// Accepted form: `<number>[k|m|g|t][bit|bps]`, case-insensitive. A bare
/// number is bits per second. SI prefixes (powers of 1000) are used, as tc
/// does for rates.
pub fn parse_rate(s: &str) -> Result<u64, RateError> {
    let err = || RateError(s.to_string());
    let lower = s.trim().to_ascii_lowercase();

    let split = lower
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(lower.len());
    let (number, unit) = lower.split_at(split);

    let value: f64 = number.parse().map_err(|_| err())?;
    if !value.is_finite() || value <= 0.0 {
        return Err(err());
    }

    let (prefix, suffix) = match unit.chars().next() {
        Some('k') => (1e3, &unit[1..]),
        Some('m') => (1e6, &unit[1..]),
        Some('g') => (1e9, &unit[1..]),
        Some('t') => (1e12, &unit[1..]),
        _ => (1.0, unit),
    };

    let bits = match suffix {
        "" | "bit" => value * prefix,
        "bps" => value * prefix * 8.0,
        _ => return Err(err()),
    };

    let bytes = (bits / 8.0).round();
    if bytes < 1.0 {
        return Err(err());
    }
    Ok(bytes as u64)
}
