//! Error types for fleet-rollback

use std::path::PathBuf;

/// Result type for fleet-rollback operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fleet-rollback operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rollback manifest at {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    /// Filesystem error from fleet-fs
    #[error(transparent)]
    Fs(#[from] fleet_fs::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
