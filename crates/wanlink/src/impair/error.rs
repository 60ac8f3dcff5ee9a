//! Error types for impairment operations.

use std::io;

/// Result type for impairment operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or reading a link.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Local I/O error (reading registry directories).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The named target is not known to the executor.
    #[error("target not found: {target}")]
    NotFound {
        /// The target identifier that was not found.
        target: String,
    },

    /// A batch operation was called with nothing selected.
    #[error("{operation}: nothing selected")]
    EmptySelection {
        /// The operation that was refused.
        operation: &'static str,
    },

    /// A spec field or interface name was rejected before any command ran.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A remote command exited non-zero, or the remote connection failed.
    #[error("{target}: `{command}` failed{}: {}", fmt_status(.status), fmt_output(.output))]
    Execution {
        /// The target the command ran in.
        target: String,
        /// The command line that failed.
        command: String,
        /// Exit status, `None` when the command never ran (transport failure).
        status: Option<i32>,
        /// Captured stdout and stderr.
        output: String,
    },
}

fn fmt_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!(" (exit {})", code),
        None => String::new(),
    }
}

fn fmt_output(output: &str) -> &str {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        "exec failed"
    } else {
        trimmed
    }
}

impl Error {
    /// Create an execution error for a command that never ran.
    pub fn transport(
        target: impl Into<String>,
        command: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Execution {
            target: target.into(),
            command: command.into(),
            status: None,
            output: reason.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Check if this is an unknown target error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an empty selection error.
    pub fn is_empty_selection(&self) -> bool {
        matches!(self, Self::EmptySelection { .. })
    }

    /// Check if the remote side failed (non-zero exit or transport).
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }

    /// Check if the caller is at fault (maps to a 4xx-class response).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::EmptySelection { .. } | Self::InvalidInput(_)
        )
    }

    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::EmptySelection { .. } | Self::InvalidInput(_) => 400,
            Self::Execution { .. } | Self::Io(_) => 500,
        }
    }

    /// Captured remote output, if this is an execution error.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Execution { output, .. } => Some(output),
            _ => None,
        }
    }
}
