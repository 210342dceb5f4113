//! Error types for fleet-runner

use std::time::Duration;

/// Result type for fleet-runner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when executing external commands
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The executable does not exist on this machine.
    #[error("Command not found: {name}")]
    NotFound { name: String },

    /// The command did not finish within its timeout. Retryable.
    #[error("Command {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    /// The command could not be spawned for a reason other than a missing
    /// executable (permissions, resource limits).
    #[error("Failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Whether a caller may reasonably retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
