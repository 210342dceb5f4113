//! Well-known paths inside the shared synchronization root.
//!
//! All machines agree on this layout:
//!
//! ```text
//! <root>/
//!   sync-config.ref.json                     active baseline
//!   sync-roadmap.md                          decision log
//!   CHANGELOG-baseline.md                    baseline version history
//!   .rollback/<decision-id>/                 per-decision rollback bundles
//!   .rollback/sync-config.ref.backup.<ts>.json   baseline backups
//!   .heartbeats/<machine-id>.json            liveness proof files
//! ```

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Active baseline file name.
pub const BASELINE_FILE: &str = "sync-config.ref.json";
/// Decision log file name.
pub const ROADMAP_FILE: &str = "sync-roadmap.md";
/// Baseline version history file name.
pub const CHANGELOG_FILE: &str = "CHANGELOG-baseline.md";
/// Directory holding rollback bundles and baseline backups.
pub const ROLLBACK_DIR: &str = ".rollback";
/// Directory holding per-machine heartbeat proof files.
pub const HEARTBEATS_DIR: &str = ".heartbeats";

/// Handle to the shared synchronization root.
///
/// Construction ensures the root and its bookkeeping directories exist, so
/// callers never have to special-case a first run.
#[derive(Debug, Clone)]
pub struct SharedRoot {
    root: PathBuf,
}

impl SharedRoot {
    /// Open (and if necessary initialize) a shared root at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;

        // Resolve symlinks and relative segments once, up front, so every
        // derived path is stable for the lifetime of the handle.
        let root = dunce::canonicalize(path).map_err(|e| Error::io(path, e))?;

        for dir in [ROLLBACK_DIR, HEARTBEATS_DIR] {
            let sub = root.join(dir);
            fs::create_dir_all(&sub).map_err(|e| Error::io(&sub, e))?;
        }

        Ok(Self { root })
    }

    /// The canonicalized root path.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of the active baseline file.
    pub fn baseline_file(&self) -> PathBuf {
        self.root.join(BASELINE_FILE)
    }

    /// Path of the decision log.
    pub fn roadmap_file(&self) -> PathBuf {
        self.root.join(ROADMAP_FILE)
    }

    /// Path of the baseline changelog.
    pub fn changelog_file(&self) -> PathBuf {
        self.root.join(CHANGELOG_FILE)
    }

    /// Directory holding rollback bundles and baseline backups.
    pub fn rollback_dir(&self) -> PathBuf {
        self.root.join(ROLLBACK_DIR)
    }

    /// Rollback bundle directory for one decision.
    pub fn rollback_point_dir(&self, decision_id: &str) -> PathBuf {
        self.rollback_dir().join(decision_id)
    }

    /// Timestamped baseline backup path. `timestamp` is a filename-safe
    /// string such as `20260806T101500Z`.
    pub fn baseline_backup_file(&self, timestamp: &str) -> PathBuf {
        self.rollback_dir()
            .join(format!("sync-config.ref.backup.{timestamp}.json"))
    }

    /// Heartbeat proof file for one machine.
    pub fn heartbeat_file(&self, machine_id: &str) -> PathBuf {
        self.root
            .join(HEARTBEATS_DIR)
            .join(format!("{machine_id}.json"))
    }

    /// Resolve a relative path against the root, refusing any path that
    /// would land outside it. Decision targets come from the shared roadmap
    /// file, which other machines write, so they are untrusted input.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let relative = relative.as_ref();
        for component in relative.components() {
            match component {
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::PathEscapes {
                        path: relative.to_path_buf(),
                    });
                }
                Component::Normal(_) | Component::CurDir => {}
            }
        }
        Ok(self.root.join(relative))
    }
}
