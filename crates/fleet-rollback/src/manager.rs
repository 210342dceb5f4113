//! Rollback point creation and restore.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleet_fs::SharedRoot;

use crate::error::{Error, Result};

const MANIFEST_FILE: &str = "manifest.toml";

/// One file captured in a rollback point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackedUpFile {
    /// Path relative to the shared root.
    pub path: String,
    /// File name of the copy inside the bundle.
    pub backup_name: String,
    /// Checksum of the captured content. Absent for files that did not
    /// exist yet.
    pub checksum: Option<String>,
    /// Whether the file existed when the point was created. Restore deletes
    /// files that did not.
    pub existed: bool,
}

/// Manifest describing a rollback point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackManifest {
    pub decision_id: String,
    pub created: DateTime<Utc>,
    pub files: Vec<BackedUpFile>,
}

/// Handle to a rollback point on disk.
#[derive(Debug, Clone)]
pub struct RollbackPoint {
    pub decision_id: String,
    pub path: PathBuf,
    pub manifest: RollbackManifest,
}

/// Outcome of a restore attempt.
///
/// A missing rollback point is not an `Err`: callers present "nothing to
/// roll back" as a clean result, so it comes back as `success = false` with
/// a descriptive error string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreReport {
    pub success: bool,
    pub restored_files: Vec<String>,
    pub logs: Vec<String>,
    pub error: Option<String>,
}

/// Creates and restores per-decision rollback points.
pub struct RollbackManager {
    root: SharedRoot,
}

impl RollbackManager {
    pub fn new(root: SharedRoot) -> Self {
        Self { root }
    }

    fn manifest_path(&self, decision_id: &str) -> PathBuf {
        self.root.rollback_point_dir(decision_id).join(MANIFEST_FILE)
    }

    /// Whether a rollback point exists for the decision.
    pub fn has_rollback_point(&self, decision_id: &str) -> bool {
        self.manifest_path(decision_id).exists()
    }

    /// Load a rollback point, if one exists.
    pub fn rollback_point(&self, decision_id: &str) -> Result<Option<RollbackPoint>> {
        let manifest_path = self.manifest_path(decision_id);
        if !manifest_path.exists() {
            return Ok(None);
        }

        let content = fleet_fs::read_text(&manifest_path)?;
        let manifest: RollbackManifest =
            toml::from_str(&content).map_err(|e| Error::Manifest {
                path: manifest_path,
                message: e.to_string(),
            })?;

        Ok(Some(RollbackPoint {
            decision_id: decision_id.to_string(),
            path: self.root.rollback_point_dir(decision_id),
            manifest,
        }))
    }

    /// Capture the current content of `files` (paths relative to the shared
    /// root) as the rollback point for `decision_id`.
    ///
    /// The bundle is staged in a temporary directory and renamed into place,
    /// so a failure mid-copy leaves no partial rollback point behind. A
    /// retry of the same decision replaces the previous bundle.
    pub fn create_rollback_point(
        &self,
        decision_id: &str,
        files: &[String],
    ) -> Result<RollbackPoint> {
        let staging = self
            .root
            .rollback_dir()
            .join(format!(".staging-{}-{}", decision_id, uuid::Uuid::new_v4()));
        fs::create_dir_all(&staging).map_err(|e| Error::io(&staging, e))?;

        let result = self.stage_files(decision_id, files, &staging);
        let manifest = match result {
            Ok(manifest) => manifest,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(e);
            }
        };

        let target = self.root.rollback_point_dir(decision_id);
        if target.exists() {
            fs::remove_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        }
        fs::rename(&staging, &target).map_err(|e| Error::io(&target, e))?;

        tracing::info!(
            decision = %decision_id,
            files = manifest.files.len(),
            "rollback point created"
        );

        Ok(RollbackPoint {
            decision_id: decision_id.to_string(),
            path: target,
            manifest,
        })
    }

    fn stage_files(
        &self,
        decision_id: &str,
        files: &[String],
        staging: &PathBuf,
    ) -> Result<RollbackManifest> {
        let mut backed_up = Vec::new();

        for file in files {
            let source = self.root.resolve(file)?;
            let backup_name = file.replace(['/', '\\'], "__");

            if source.exists() {
                let dest = staging.join(&backup_name);
                fs::copy(&source, &dest).map_err(|e| Error::io(&source, e))?;
                let checksum = fleet_fs::file_checksum(&dest)?;
                backed_up.push(BackedUpFile {
                    path: file.clone(),
                    backup_name,
                    checksum: Some(checksum),
                    existed: true,
                });
            } else {
                backed_up.push(BackedUpFile {
                    path: file.clone(),
                    backup_name,
                    checksum: None,
                    existed: false,
                });
            }
        }

        let manifest = RollbackManifest {
            decision_id: decision_id.to_string(),
            created: Utc::now(),
            files: backed_up,
        };

        let content = toml::to_string_pretty(&manifest).map_err(|e| Error::Manifest {
            path: staging.join(MANIFEST_FILE),
            message: e.to_string(),
        })?;
        fleet_fs::write_text(&staging.join(MANIFEST_FILE), &content)?;

        Ok(manifest)
    }

    /// Put every file captured in the rollback point back the way it was.
    ///
    /// Files that existed are copied back; files the decision created from
    /// nothing are deleted. Checksum mismatches between the bundle and its
    /// manifest are logged but do not stop the restore.
    pub fn restore_from_rollback_point(&self, decision_id: &str) -> RestoreReport {
        let point = match self.rollback_point(decision_id) {
            Ok(Some(point)) => point,
            Ok(None) => {
                return RestoreReport {
                    success: false,
                    restored_files: Vec::new(),
                    logs: vec![format!("no rollback point recorded for {decision_id}")],
                    error: Some(format!("No rollback point exists for {decision_id}")),
                };
            }
            Err(e) => {
                return RestoreReport {
                    success: false,
                    restored_files: Vec::new(),
                    logs: Vec::new(),
                    error: Some(format!("Failed to read rollback point: {e}")),
                };
            }
        };

        let mut report = RestoreReport {
            success: true,
            restored_files: Vec::new(),
            logs: Vec::new(),
            error: None,
        };

        for file in &point.manifest.files {
            let target = match self.root.resolve(&file.path) {
                Ok(target) => target,
                Err(e) => {
                    report.success = false;
                    report.error = Some(format!("Refused to restore {}: {e}", file.path));
                    return report;
                }
            };

            if file.existed {
                let backup = point.path.join(&file.backup_name);
                if let (Some(expected), Ok(actual)) =
                    (&file.checksum, fleet_fs::file_checksum(&backup))
                    && expected != &actual
                {
                    tracing::warn!(
                        decision = %decision_id,
                        file = %file.path,
                        "rollback bundle checksum mismatch"
                    );
                    report
                        .logs
                        .push(format!("checksum mismatch for {}, restoring anyway", file.path));
                }

                if let Some(parent) = target.parent()
                    && !parent.exists()
                    && let Err(e) = fs::create_dir_all(parent)
                {
                    report.success = false;
                    report.error = Some(format!("Failed to restore {}: {e}", file.path));
                    return report;
                }
                if let Err(e) = fs::copy(&backup, &target) {
                    report.success = false;
                    report.error = Some(format!("Failed to restore {}: {e}", file.path));
                    return report;
                }
                report.logs.push(format!("restored {}", file.path));
                report.restored_files.push(file.path.clone());
            } else if target.exists() {
                if let Err(e) = fs::remove_file(&target) {
                    report.success = false;
                    report.error = Some(format!("Failed to remove {}: {e}", file.path));
                    return report;
                }
                report
                    .logs
                    .push(format!("removed {} (did not exist before apply)", file.path));
                report.restored_files.push(file.path.clone());
            }
        }

        tracing::info!(
            decision = %decision_id,
            restored = report.restored_files.len(),
            "rollback point restored"
        );
        report
    }
}
