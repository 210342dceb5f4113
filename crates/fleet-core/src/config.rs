//! Engine configuration.
//!
//! All tunables live in `sync.toml`; every field has a documented default so
//! a minimal file only names the shared root and the machine. Environment
//! variables override the file for the two values that differ per machine in
//! practice.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use fleet_heartbeat::HeartbeatConfig;

use crate::error::{Error, Result};

/// Environment variable overriding the shared root path.
pub const ENV_ROOT: &str = "FLEET_SYNC_ROOT";
/// Environment variable overriding the machine identifier.
pub const ENV_MACHINE: &str = "FLEET_SYNC_MACHINE";
/// Environment variable naming the configuration file.
pub const ENV_CONFIG: &str = "FLEET_SYNC_CONFIG";

fn default_heartbeat_interval() -> u64 {
    60
}
fn default_warning_threshold() -> u64 {
    120
}
fn default_offline_threshold() -> u64 {
    300
}
fn default_command_timeout() -> u64 {
    30
}
fn default_heartbeat_write_timeout() -> u64 {
    3
}

/// Liveness tunables, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSettings {
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold_secs: u64,
    #[serde(default = "default_offline_threshold")]
    pub offline_threshold_secs: u64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval(),
            warning_threshold_secs: default_warning_threshold(),
            offline_threshold_secs: default_offline_threshold(),
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// The shared filesystem location all machines synchronize through.
    pub shared_root: PathBuf,
    /// Stable identifier of this machine.
    pub machine_id: String,

    #[serde(default)]
    pub heartbeat: HeartbeatSettings,

    /// Bound on any single external command invocation, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Bound on the fire-and-forget heartbeat proof write, in seconds.
    /// Short on purpose: a slow shared-storage check must never delay the
    /// caller's primary operation.
    #[serde(default = "default_heartbeat_write_timeout")]
    pub heartbeat_write_timeout_secs: u64,
}

impl SyncConfig {
    /// Programmatic configuration with all defaults.
    pub fn new(shared_root: impl Into<PathBuf>, machine_id: impl Into<String>) -> Self {
        Self {
            shared_root: shared_root.into(),
            machine_id: machine_id.into(),
            heartbeat: HeartbeatSettings::default(),
            command_timeout_secs: default_command_timeout(),
            heartbeat_write_timeout_secs: default_heartbeat_write_timeout(),
        }
    }

    /// Parse a configuration file, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fleet_fs::read_text(path)?;
        let mut config: SyncConfig = toml::from_str(&content).map_err(|e| Error::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Locate and load the configuration: `$FLEET_SYNC_CONFIG`, then
    /// `./sync.toml`, then the user config directory.
    pub fn load() -> Result<Self> {
        let candidates = [
            std::env::var(ENV_CONFIG).ok().map(PathBuf::from),
            Some(PathBuf::from("sync.toml")),
            dirs::config_dir().map(|dir| dir.join("fleet-sync").join("sync.toml")),
        ];

        for candidate in candidates.into_iter().flatten() {
            if candidate.exists() {
                return Self::load_from(&candidate);
            }
        }

        Err(Error::Config {
            message: "no sync.toml found (set FLEET_SYNC_CONFIG or create one)".to_string(),
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var(ENV_ROOT) {
            self.shared_root = PathBuf::from(root);
        }
        if let Ok(machine) = std::env::var(ENV_MACHINE) {
            self.machine_id = machine;
        }
    }

    /// Thresholds in the form the registry consumes.
    pub fn heartbeat_config(&self) -> HeartbeatConfig {
        HeartbeatConfig::from_secs(
            self.heartbeat.interval_secs as i64,
            self.heartbeat.warning_threshold_secs as i64,
            self.heartbeat.offline_threshold_secs as i64,
        )
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn heartbeat_write_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_write_timeout_secs)
    }
}
