//! Interface reference type addressing one link inside one target.
//!
//! An [`InterfaceRef`] names a target (a container, a network namespace, the
//! host) together with an interface inside it. Names coming from discovery
//! may carry peer annotations such as `eth0@if23:`; the constructor stores
//! the canonical form so command lines and status keys never see them.
//!
//! # Example
//!
//! ```
//! use wanlink::InterfaceRef;
//!
//! let link = InterfaceRef::new("client1", "eth0@if23:");
//! assert_eq!(link.interface(), "eth0");
//! assert_eq!(link.key(), "client1:eth0");
//!
//! let parsed: InterfaceRef = "client1:eth0".parse().unwrap();
//! assert_eq!(parsed, link);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::error::{Error, Result};
use crate::util::ifname;

/// A reference to a network interface inside a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InterfaceRef {
    target: String,
    #[serde(rename = "iface")]
    interface: String,
}

impl InterfaceRef {
    /// Create a reference, canonicalizing the interface name.
    pub fn new(target: impl Into<String>, interface: impl AsRef<str>) -> Self {
        Self {
            target: target.into(),
            interface: ifname::canonicalize(interface.as_ref()).to_string(),
        }
    }

    /// Parse `target:interface`, falling back to `default_iface` when the
    /// interface part is missing.
    ///
    /// Only the first colon separates the target, so a raw discovery name
    /// like `client1:eth0@if23:` still resolves to `eth0`.
    pub fn parse_with_default(s: &str, default_iface: &str) -> Result<Self> {
        let s = s.trim();
        let (target, iface) = match s.split_once(':') {
            Some((target, iface)) if !ifname::canonicalize(iface).is_empty() => (target, iface),
            Some((target, _)) => (target, default_iface),
            None => (s, default_iface),
        };

        if target.is_empty() {
            return Err(Error::invalid(format!("missing target in {:?}", s)));
        }

        Ok(Self::new(target, iface))
    }

    /// The target identifier.
    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The canonical interface name.
    #[inline]
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Status key, `target:interface`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.target, self.interface)
    }

    /// Check that the interface name is safe to put on a command line.
    pub fn validate(&self) -> Result<()> {
        ifname::validate(&self.interface).map_err(|e| Error::invalid(e.to_string()))
    }
}

impl fmt::Display for InterfaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target, self.interface)
    }
}

impl FromStr for InterfaceRef {
    type Err = Error;

    /// Parse `target:interface`. The interface part is required.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((target, iface))
                if !target.is_empty() && !ifname::canonicalize(iface).is_empty() =>
            {
                Ok(Self::new(target, iface))
            }
            _ => Err(Error::invalid(format!(
                "expected TARGET:IFACE, got {:?}",
                s
            ))),
        }
    }
}

impl<T: Into<String>, I: AsRef<str>> From<(T, I)> for InterfaceRef {
    #[inline]
    fn from((target, iface): (T, I)) -> Self {
        Self::new(target, iface)
    }
}

/// Wire form used in request bodies: `{"name": "...", "iface": "..."}`.
#[derive(Deserialize)]
struct PortRef {
    #[serde(alias = "target")]
    name: String,
    iface: String,
}

impl<'de> Deserialize<'de> for InterfaceRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let port = PortRef::deserialize(deserializer)?;
        Ok(Self::new(port.name, port.iface))
    }
}
