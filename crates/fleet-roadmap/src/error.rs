//! Error types for fleet-roadmap

/// Result type for fleet-roadmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fleet-roadmap operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The roadmap file violates the block grammar.
    #[error("Roadmap parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// No decision with this id exists in the roadmap.
    #[error("Decision not found: {id}")]
    DecisionNotFound { id: String },

    /// Filesystem error from fleet-fs
    #[error(transparent)]
    Fs(#[from] fleet_fs::Error),
}

impl Error {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
