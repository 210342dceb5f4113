//! Reactions to machines leaving and rejoining the fleet.
//!
//! The coordinator consumes registry transitions and turns them into
//! backup-then-sync actions. Both operations verify the machine is actually
//! in the state the caller claims (a stale tool invocation must not back up
//! or re-sync on the wrong premise), and both support a dry run that
//! short-circuits before any backup or mutation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use fleet_baseline::BaselineStore;
use fleet_heartbeat::{HeartbeatRegistry, MachineStatus, Transition};

use crate::error::{Error, Result};

/// Options for [`SyncEventCoordinator::sync_on_offline`].
#[derive(Debug, Clone, Copy)]
pub struct OfflineSyncOptions {
    /// Back up the active baseline before recording the sync.
    pub create_backup: bool,
    pub dry_run: bool,
}

impl Default for OfflineSyncOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
            dry_run: false,
        }
    }
}

/// Options for [`SyncEventCoordinator::sync_on_online`].
#[derive(Debug, Clone, Copy)]
pub struct OnlineSyncOptions {
    /// Re-sync the machine from the active baseline.
    pub sync_from_baseline: bool,
    pub dry_run: bool,
}

impl Default for OnlineSyncOptions {
    fn default() -> Self {
        Self {
            sync_from_baseline: true,
            dry_run: false,
        }
    }
}

/// Counters describing what a sync event did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncChanges {
    pub files_synced: u32,
    pub conflicts_resolved: u32,
    pub decisions_created: u32,
    /// How long the machine was offline, for online events that followed a
    /// tracked offline episode.
    pub offline_duration_secs: Option<i64>,
}

/// Result of a sync event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEventResult {
    pub machine_id: String,
    pub success: bool,
    /// True when the run was a dry run and nothing was touched.
    pub simulated: bool,
    pub message: String,
    pub changes: SyncChanges,
    pub backup_path: Option<String>,
}

/// Turns liveness transitions into backup and re-sync actions.
pub struct SyncEventCoordinator {
    registry: Arc<RwLock<HeartbeatRegistry>>,
    baselines: Arc<BaselineStore>,
    /// Start of the most recent offline episode per machine, kept past the
    /// heartbeat that clears `offline_since` in the registry so the online
    /// sync can still compute the duration.
    offline_episodes: StdMutex<HashMap<String, DateTime<Utc>>>,
}

impl SyncEventCoordinator {
    pub fn new(registry: Arc<RwLock<HeartbeatRegistry>>, baselines: Arc<BaselineStore>) -> Self {
        Self {
            registry,
            baselines,
            offline_episodes: StdMutex::new(HashMap::new()),
        }
    }

    /// Record a registry transition. Offline episodes are remembered here so
    /// their duration survives the registry resetting on the next heartbeat.
    pub fn note_transition(&self, transition: &Transition) {
        let mut episodes = self.offline_episodes.lock().expect("episode map poisoned");
        match transition {
            Transition::BecameOffline { machine_id, at } => {
                episodes.insert(machine_id.clone(), *at);
            }
            Transition::BecameOnline {
                machine_id,
                offline_since: Some(since),
                ..
            } => {
                // The registry already cleared its own record; keep ours
                // until the online sync consumes it.
                episodes.entry(machine_id.clone()).or_insert(*since);
            }
            _ => {}
        }
    }

    /// Handle a machine going offline: back up the shared baseline and
    /// record the event.
    pub async fn sync_on_offline(
        &self,
        machine_id: &str,
        opts: OfflineSyncOptions,
    ) -> Result<SyncEventResult> {
        self.require_status(machine_id, MachineStatus::Offline)
            .await?;

        if opts.dry_run {
            return Ok(SyncEventResult {
                machine_id: machine_id.to_string(),
                success: true,
                simulated: true,
                message: format!(
                    "[dry-run] Would back up the baseline and record the offline sync for {machine_id}"
                ),
                changes: SyncChanges::default(),
                backup_path: None,
            });
        }

        let mut changes = SyncChanges::default();
        let backup_path = if opts.create_backup {
            match self.baselines.backup_current() {
                Ok(path) => {
                    changes.files_synced += 1;
                    Some(path.display().to_string())
                }
                Err(fleet_baseline::Error::NotFound) => {
                    tracing::debug!(machine = %machine_id, "no baseline to back up");
                    None
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };

        tracing::info!(machine = %machine_id, "offline sync recorded");
        Ok(SyncEventResult {
            machine_id: machine_id.to_string(),
            success: true,
            simulated: false,
            message: format!("Offline sync recorded for {machine_id}"),
            changes,
            backup_path,
        })
    }

    /// Handle a machine coming back: compute how long it was away and
    /// optionally re-sync it from the active baseline.
    pub async fn sync_on_online(
        &self,
        machine_id: &str,
        opts: OnlineSyncOptions,
    ) -> Result<SyncEventResult> {
        self.require_status(machine_id, MachineStatus::Online)
            .await?;

        let offline_duration_secs = self
            .offline_episodes
            .lock()
            .expect("episode map poisoned")
            .get(machine_id)
            .map(|since| (Utc::now() - *since).num_seconds());

        if opts.dry_run {
            return Ok(SyncEventResult {
                machine_id: machine_id.to_string(),
                success: true,
                simulated: true,
                message: format!("[dry-run] Would re-sync {machine_id} from the baseline"),
                changes: SyncChanges {
                    offline_duration_secs,
                    ..Default::default()
                },
                backup_path: None,
            });
        }

        let mut changes = SyncChanges {
            offline_duration_secs,
            ..Default::default()
        };

        let message = if opts.sync_from_baseline {
            match self.baselines.load() {
                Ok(baseline) => {
                    // Re-write the active baseline so the returning machine
                    // reads a canonical, fully synced copy.
                    self.baselines.save(&baseline)?;
                    changes.files_synced += 1;
                    format!("Re-synced {machine_id} from baseline {}", baseline.version)
                }
                Err(fleet_baseline::Error::NotFound) => {
                    format!("No baseline to sync for {machine_id}")
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            format!("Online sync recorded for {machine_id}")
        };

        // Episode consumed; the next online sync without a new offline
        // episode reports no duration.
        self.offline_episodes
            .lock()
            .expect("episode map poisoned")
            .remove(machine_id);

        tracing::info!(machine = %machine_id, ?offline_duration_secs, "online sync recorded");
        Ok(SyncEventResult {
            machine_id: machine_id.to_string(),
            success: true,
            simulated: false,
            message,
            changes,
            backup_path: None,
        })
    }

    async fn require_status(&self, machine_id: &str, expected: MachineStatus) -> Result<()> {
        let registry = self.registry.read().await;
        let entry = registry
            .get(machine_id)
            .ok_or_else(|| Error::MachineNotFound {
                machine_id: machine_id.to_string(),
            })?;

        if entry.status == expected {
            Ok(())
        } else if expected == MachineStatus::Offline {
            Err(Error::MachineNotOffline {
                machine_id: machine_id.to_string(),
            })
        } else {
            Err(Error::MachineNotOnline {
                machine_id: machine_id.to_string(),
            })
        }
    }
}
