//! Shared utilities for wanlink.

pub mod ifname;
pub mod rate;

pub use ifname::{canonicalize, validate};
pub use rate::parse_rate;
