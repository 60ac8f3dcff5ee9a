//! Interface name utilities.

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = 16;

/// Error type for interface name checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IfError {
    #[error("invalid interface name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, IfError>;

/// Strip kernel-internal annotations from an interface name.
///
/// `ip -o link show` reports veth peers as `eth0@if23:`; everything from the
/// first `@` is dropped, then any trailing colons.
///
/// ```
/// use wanlink::util::ifname::canonicalize;
///
/// assert_eq!(canonicalize("eth0@if23:"), "eth0");
/// assert_eq!(canonicalize("eth1:"), "eth1");
/// assert_eq!(canonicalize("eth0"), "eth0");
/// ```
pub fn canonicalize(name: &str) -> &str {
    let name = match name.find('@') {
        Some(at) => &name[..at],
        None => name,
    };
    name.trim().trim_end_matches(':').trim_end()
}

/// Validate a canonical interface name before it is placed in a command.
pub fn validate(name: &str) -> Result<()> {
    let invalid = |reason| {
        Err(IfError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return invalid("empty name");
    }

    if name.len() >= IFNAMSIZ {
        return invalid("name too long (max 15 chars)");
    }

    if name.contains('/') || name.contains('\0') {
        return invalid("name contains invalid characters");
    }

    if name.chars().any(|c| c.is_whitespace()) {
        return invalid("name contains whitespace");
    }

    // The name ends up in a `sh -c` line
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'))
    {
        return invalid("name contains shell metacharacters");
    }

    Ok(())
}
