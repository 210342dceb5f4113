//! Error types for fleet-baseline

use std::path::PathBuf;

/// Result type for fleet-baseline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fleet-baseline operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No active baseline exists. A legitimate condition on first run.
    #[error("No baseline exists at the shared root")]
    NotFound,

    /// The requested version string is not valid semver.
    #[error("Invalid version {version:?}: {reason}")]
    InvalidVersion { version: String, reason: String },

    /// The version has already been tagged; versions are immutable.
    #[error("Version marker already exists: {tag}")]
    TagExists { tag: String },

    /// No version marker with this name exists.
    #[error("Version marker not found: {tag}")]
    TagNotFound { tag: String },

    /// The restore source was treated as a backup file path and it does not
    /// exist.
    #[error("Backup file not found: {path}")]
    BackupNotFound { path: PathBuf },

    /// The restored payload is not a structurally valid baseline.
    #[error("Invalid baseline payload: {reason}")]
    InvalidPayload { reason: String },

    /// A version-control command ran but reported failure.
    #[error("git {operation} failed: {stderr}")]
    GitFailed { operation: String, stderr: String },

    /// Command execution error from fleet-runner
    #[error(transparent)]
    Runner(#[from] fleet_runner::Error),

    /// Filesystem error from fleet-fs
    #[error(transparent)]
    Fs(#[from] fleet_fs::Error),
}
