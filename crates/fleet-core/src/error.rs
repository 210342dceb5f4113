//! Error types for fleet-core
//!
//! Every error carries a stable machine-readable code so calling layers can
//! branch without parsing messages.

use fleet_roadmap::DecisionStatus;

/// Result type for fleet-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fleet-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No decision with this id exists in the roadmap.
    #[error("Decision not found: {id}")]
    DecisionNotFound { id: String },

    /// Apply requires an approved decision.
    #[error("Decision {id} is not approved (status: {})", .status.as_str())]
    DecisionNotApproved { id: String, status: DecisionStatus },

    /// The requested status change is not in the lifecycle.
    #[error("Decision {id} cannot move from {} to {}", .from.as_str(), .to.as_str())]
    IllegalTransition {
        id: String,
        from: DecisionStatus,
        to: DecisionStatus,
    },

    /// The decision is missing the payload its kind requires.
    #[error("Decision {id} is not applicable: {reason}")]
    DecisionInvalid { id: String, reason: String },

    /// The decision conflicts with the current shared state. `force`
    /// bypasses this check.
    #[error("Decision {id} conflicts with current state: {reason}")]
    Conflict { id: String, reason: String },

    /// The machine has never sent a heartbeat.
    #[error("Machine not found: {machine_id}")]
    MachineNotFound { machine_id: String },

    /// Offline-sync requires the machine to actually be offline.
    #[error("Machine {machine_id} is not offline")]
    MachineNotOffline { machine_id: String },

    /// Online-sync requires the machine to actually be online.
    #[error("Machine {machine_id} is not online")]
    MachineNotOnline { machine_id: String },

    /// Invalid or unlocatable configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Filesystem error from fleet-fs
    #[error(transparent)]
    Fs(#[from] fleet_fs::Error),

    /// Command execution error from fleet-runner
    #[error(transparent)]
    Runner(#[from] fleet_runner::Error),

    /// Baseline error from fleet-baseline
    #[error(transparent)]
    Baseline(#[from] fleet_baseline::Error),

    /// Rollback error from fleet-rollback
    #[error(transparent)]
    Rollback(#[from] fleet_rollback::Error),

    /// Roadmap error from fleet-roadmap
    #[error(transparent)]
    Roadmap(#[from] fleet_roadmap::Error),
}

impl Error {
    /// Stable machine-readable code for the tool-facing contract.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DecisionNotFound { .. } => "DECISION_NOT_FOUND",
            Self::DecisionNotApproved { .. } => "DECISION_NOT_APPROVED",
            Self::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            Self::DecisionInvalid { .. } => "DECISION_INVALID",
            Self::Conflict { .. } => "DECISION_CONFLICT",
            Self::MachineNotFound { .. } => "MACHINE_NOT_FOUND",
            Self::MachineNotOffline { .. } => "MACHINE_NOT_OFFLINE",
            Self::MachineNotOnline { .. } => "MACHINE_NOT_ONLINE",
            Self::Config { .. } => "CONFIG_INVALID",

            Self::Fs(_) => "FS_ERROR",

            Self::Runner(fleet_runner::Error::Timeout { .. }) => "COMMAND_TIMEOUT",
            Self::Runner(fleet_runner::Error::NotFound { .. }) => "COMMAND_NOT_FOUND",
            Self::Runner(_) => "COMMAND_FAILED",

            Self::Baseline(fleet_baseline::Error::NotFound) => "BASELINE_NOT_FOUND",
            Self::Baseline(fleet_baseline::Error::InvalidVersion { .. }) => "INVALID_VERSION",
            Self::Baseline(fleet_baseline::Error::TagExists { .. }) => "TAG_EXISTS",
            Self::Baseline(fleet_baseline::Error::TagNotFound { .. }) => "TAG_NOT_FOUND",
            Self::Baseline(fleet_baseline::Error::BackupNotFound { .. }) => "BACKUP_NOT_FOUND",
            Self::Baseline(fleet_baseline::Error::InvalidPayload { .. }) => "BASELINE_INVALID",
            Self::Baseline(fleet_baseline::Error::GitFailed { .. }) => "GIT_FAILED",
            Self::Baseline(fleet_baseline::Error::Runner(fleet_runner::Error::Timeout {
                ..
            })) => "COMMAND_TIMEOUT",
            Self::Baseline(_) => "BASELINE_ERROR",

            Self::Rollback(_) => "ROLLBACK_ERROR",

            Self::Roadmap(fleet_roadmap::Error::DecisionNotFound { .. }) => "DECISION_NOT_FOUND",
            Self::Roadmap(_) => "ROADMAP_ERROR",
        }
    }
}
