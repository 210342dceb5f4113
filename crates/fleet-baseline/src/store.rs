//! The baseline store: load, version, restore.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use fleet_fs::SharedRoot;
use fleet_runner::{CommandRunner, RunOptions};

use crate::changelog;
use crate::error::{Error, Result};
use crate::model::Baseline;

/// Naming convention for version markers.
const TAG_PREFIX: &str = "baseline-v";

/// Options for [`BaselineStore::version`].
#[derive(Debug, Clone)]
pub struct VersionOptions {
    /// Human-readable message for the marker and changelog. Defaults to
    /// `Baseline <version>`.
    pub message: Option<String>,
    /// Push the marker to `origin` after creating it.
    pub push_tags: bool,
    /// Append an entry to `CHANGELOG-baseline.md`.
    pub create_changelog: bool,
}

impl Default for VersionOptions {
    fn default() -> Self {
        Self {
            message: None,
            push_tags: false,
            create_changelog: true,
        }
    }
}

/// Options for [`BaselineStore::restore`].
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Snapshot the current baseline into the backup directory before
    /// overwriting it.
    pub create_backup: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
        }
    }
}

/// Receipt of a successful `version` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionReceipt {
    pub tag: String,
    pub message: String,
}

/// Reads, versions, and restores the active baseline.
///
/// `version` and `restore` both read-then-write the single active baseline
/// file, so they are serialized behind one mutex: one versioning operation
/// in flight per machine at a time.
pub struct BaselineStore {
    root: SharedRoot,
    runner: Arc<dyn CommandRunner>,
    git_timeout: Duration,
    write_lock: Mutex<()>,
}

impl BaselineStore {
    pub fn new(root: SharedRoot, runner: Arc<dyn CommandRunner>, git_timeout: Duration) -> Self {
        Self {
            root,
            runner,
            git_timeout,
            write_lock: Mutex::new(()),
        }
    }

    /// Load the active baseline. Missing file is [`Error::NotFound`].
    pub fn load(&self) -> Result<Baseline> {
        let path = self.root.baseline_file();
        if !path.exists() {
            return Err(Error::NotFound);
        }
        let content = fleet_fs::read_text(&path)?;
        Baseline::from_payload(&content)
    }

    /// Atomically write `baseline` as the active baseline.
    pub fn save(&self, baseline: &Baseline) -> Result<()> {
        fleet_fs::write_json(&self.root.baseline_file(), baseline)?;
        Ok(())
    }

    /// Snapshot the current baseline into the backup directory. Returns the
    /// backup path.
    pub fn backup_current(&self) -> Result<PathBuf> {
        let current = self.root.baseline_file();
        if !current.exists() {
            return Err(Error::NotFound);
        }
        let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
        let backup = self.root.baseline_backup_file(&timestamp);
        let content = fleet_fs::read_text(&current)?;
        fleet_fs::write_text(&backup, &content)?;
        tracing::info!(path = %backup.display(), "baseline backed up");
        Ok(backup)
    }

    /// Create an immutable version marker for the current baseline.
    ///
    /// Validates `new_version` as semver before touching anything, then
    /// advances the baseline's version field, tags the shared root with
    /// `baseline-v<semver>` carrying the serialized baseline, and optionally
    /// appends the changelog and pushes the tag. Re-tagging an existing
    /// version fails: markers are immutable.
    pub async fn version(
        &self,
        new_version: &str,
        opts: VersionOptions,
    ) -> Result<VersionReceipt> {
        semver::Version::parse(new_version).map_err(|e| Error::InvalidVersion {
            version: new_version.to_string(),
            reason: e.to_string(),
        })?;

        let _guard = self.write_lock.lock().await;

        let mut baseline = self.load()?;
        let tag = format!("{TAG_PREFIX}{new_version}");

        if self.tag_exists(&tag).await? {
            return Err(Error::TagExists { tag });
        }

        let now = Utc::now();
        baseline.version = new_version.to_string();
        baseline.last_updated = now;
        self.save(&baseline)?;

        let message = opts
            .message
            .unwrap_or_else(|| format!("Baseline {new_version}"));
        let payload = serde_json::to_string_pretty(&baseline).map_err(|e| {
            Error::InvalidPayload {
                reason: e.to_string(),
            }
        })?;

        self.git(&["add", fleet_fs::layout::BASELINE_FILE], "add")
            .await?;
        self.commit_baseline(&message).await?;

        let tag_message = format!("{message}\n\n{payload}");
        self.git(&["tag", "-a", &tag, "-m", &tag_message], "tag")
            .await?;
        tracing::info!(%tag, "baseline version marker created");

        if opts.create_changelog {
            changelog::append_entry(&self.root.changelog_file(), &tag, &message, now)?;
        }

        if opts.push_tags {
            self.git(&["push", "origin", &tag], "push").await?;
        }

        Ok(VersionReceipt { tag, message })
    }

    /// Restore the active baseline from a version marker or a backup file.
    ///
    /// Sources matching the `baseline-v` convention resolve through the
    /// marker's embedded payload; anything else is treated as a literal
    /// backup file path. The current baseline is snapshotted first unless
    /// `opts.create_backup` is off.
    pub async fn restore(&self, source: &str, opts: RestoreOptions) -> Result<Baseline> {
        let _guard = self.write_lock.lock().await;

        let restored = if source.starts_with(TAG_PREFIX) {
            self.read_tag_payload(source).await?
        } else {
            let path = PathBuf::from(source);
            if !path.exists() {
                return Err(Error::BackupNotFound { path });
            }
            let content = fleet_fs::read_text(&path)?;
            Baseline::from_payload(&content)?
        };

        if opts.create_backup && self.root.baseline_file().exists() {
            self.backup_current()?;
        }

        self.save(&restored)?;
        tracing::info!(source = %source, version = %restored.version, "baseline restored");
        Ok(restored)
    }

    async fn tag_exists(&self, tag: &str) -> Result<bool> {
        let output = self.git(&["tag", "-l", tag], "tag -l").await?;
        Ok(!output.trim().is_empty())
    }

    /// Read the baseline payload embedded in an annotated tag's message.
    async fn read_tag_payload(&self, tag: &str) -> Result<Baseline> {
        if !self.tag_exists(tag).await? {
            return Err(Error::TagNotFound {
                tag: tag.to_string(),
            });
        }

        let contents = self
            .git(&["tag", "-l", "--format=%(contents)", tag], "tag contents")
            .await?;

        // The message is `<human text>\n\n<payload JSON>`.
        let payload_start = contents.find('{').ok_or_else(|| Error::InvalidPayload {
            reason: format!("marker {tag} carries no payload"),
        })?;
        Baseline::from_payload(contents[payload_start..].trim())
    }

    async fn git(&self, args: &[&str], operation: &str) -> Result<String> {
        let opts = RunOptions::in_dir(self.root.path()).with_timeout(self.git_timeout);
        let output = self.runner.run("git", args, opts).await?;
        if !output.success {
            return Err(Error::GitFailed {
                operation: operation.to_string(),
                stderr: if output.stderr.is_empty() {
                    output.stdout
                } else {
                    output.stderr
                },
            });
        }
        Ok(output.stdout)
    }

    /// Commit the baseline file. A no-op tree ("nothing to commit") is not a
    /// failure: re-versioning identical content must still produce a marker.
    async fn commit_baseline(&self, message: &str) -> Result<()> {
        let opts = RunOptions::in_dir(self.root.path()).with_timeout(self.git_timeout);
        let output = self
            .runner
            .run("git", &["commit", "-m", message], opts)
            .await?;
        if !output.success {
            let combined = format!("{}{}", output.stdout, output.stderr);
            if !combined.contains("nothing to commit") {
                return Err(Error::GitFailed {
                    operation: "commit".to_string(),
                    stderr: combined,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_runner::fake::FakeRunner;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_with(runner: Arc<FakeRunner>) -> (TempDir, BaselineStore) {
        let temp = TempDir::new().unwrap();
        let root = SharedRoot::new(temp.path()).unwrap();
        let store = BaselineStore::new(root, runner, Duration::from_secs(5));
        (temp, store)
    }

    fn seeded_store(runner: Arc<FakeRunner>) -> (TempDir, BaselineStore) {
        let (temp, store) = store_with(runner);
        store.save(&Baseline::new("m1", "1.0.0")).unwrap();
        (temp, store)
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let (_temp, store) = store_with(Arc::new(FakeRunner::new()));
        assert!(matches!(store.load(), Err(Error::NotFound)));
    }

    #[test]
    fn test_save_then_load() {
        let (_temp, store) = store_with(Arc::new(FakeRunner::new()));
        let baseline = Baseline::new("m1", "1.0.0");
        store.save(&baseline).unwrap();
        assert_eq!(store.load().unwrap(), baseline);
    }

    #[tokio::test]
    async fn test_version_rejects_invalid_semver_before_git() {
        let runner = Arc::new(FakeRunner::new());
        let (_temp, store) = seeded_store(runner.clone());

        let err = store
            .version("not-a-version", VersionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_version_without_baseline_fails() {
        let (_temp, store) = store_with(Arc::new(FakeRunner::new()));
        let err = store
            .version("2.0.0", VersionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[tokio::test]
    async fn test_version_creates_marker_and_changelog() {
        let runner = Arc::new(FakeRunner::new());
        let (temp, store) = seeded_store(runner.clone());

        let receipt = store
            .version("2.0.0", VersionOptions::default())
            .await
            .unwrap();
        assert_eq!(receipt.tag, "baseline-v2.0.0");
        assert_eq!(receipt.message, "Baseline 2.0.0");

        assert!(runner.saw("git", &["tag", "-a", "baseline-v2.0.0"]));
        assert_eq!(store.load().unwrap().version, "2.0.0");

        let changelog = std::fs::read_to_string(temp.path().join("CHANGELOG-baseline.md")).unwrap();
        assert!(changelog.contains("baseline-v2.0.0"));
    }

    #[tokio::test]
    async fn test_version_supports_prerelease() {
        let runner = Arc::new(FakeRunner::new());
        let (_temp, store) = seeded_store(runner.clone());

        let receipt = store
            .version("2.0.0-beta1", VersionOptions::default())
            .await
            .unwrap();
        assert_eq!(receipt.tag, "baseline-v2.0.0-beta1");
    }

    #[tokio::test]
    async fn test_version_twice_fails_with_tag_exists() {
        let runner = Arc::new(FakeRunner::new());
        runner.ok("git", &["tag", "-l", "baseline-v2.0.0"], "baseline-v2.0.0\n");
        let (_temp, store) = seeded_store(runner);

        let err = store
            .version("2.0.0", VersionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TagExists { .. }));
    }

    #[tokio::test]
    async fn test_version_pushes_when_asked() {
        let runner = Arc::new(FakeRunner::new());
        let (_temp, store) = seeded_store(runner.clone());

        store
            .version(
                "2.0.0",
                VersionOptions {
                    push_tags: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(runner.saw("git", &["push", "origin", "baseline-v2.0.0"]));
    }

    #[tokio::test]
    async fn test_restore_missing_backup_leaves_baseline_untouched() {
        let runner = Arc::new(FakeRunner::new());
        let (_temp, store) = seeded_store(runner);
        let before = store.load().unwrap();

        let err = store
            .restore("/nonexistent/backup.json", RestoreOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BackupNotFound { .. }));
        assert_eq!(store.load().unwrap(), before);
    }

    #[tokio::test]
    async fn test_restore_unknown_tag() {
        let runner = Arc::new(FakeRunner::new());
        runner.ok("git", &["tag", "-l", "baseline-v9.9.9"], "");
        let (_temp, store) = seeded_store(runner);

        let err = store
            .restore("baseline-v9.9.9", RestoreOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TagNotFound { .. }));
    }

    #[tokio::test]
    async fn test_restore_from_tag_is_idempotent() {
        let tagged = Baseline::new("m1", "1.0.0");
        let payload = serde_json::to_string_pretty(&tagged).unwrap();

        let runner = Arc::new(FakeRunner::new());
        runner.ok(
            "git",
            &["tag", "-l", "--format=%(contents)", "baseline-v1.0.0"],
            &format!("Baseline 1.0.0\n\n{payload}"),
        );
        runner.ok("git", &["tag", "-l", "baseline-v1.0.0"], "baseline-v1.0.0\n");

        let (_temp, store) = store_with(runner);
        store.save(&Baseline::new("m1", "2.0.0")).unwrap();

        let first = store
            .restore("baseline-v1.0.0", RestoreOptions::default())
            .await
            .unwrap();
        let second = store
            .restore("baseline-v1.0.0", RestoreOptions::default())
            .await
            .unwrap();
        assert_eq!(first.config, second.config);
        assert_eq!(store.load().unwrap().version, "1.0.0");
    }

    #[tokio::test]
    async fn test_restore_creates_backup_of_current() {
        let tagged = Baseline::new("m1", "1.0.0");
        let payload = serde_json::to_string_pretty(&tagged).unwrap();

        let runner = Arc::new(FakeRunner::new());
        runner.ok(
            "git",
            &["tag", "-l", "--format=%(contents)", "baseline-v1.0.0"],
            &format!("msg\n\n{payload}"),
        );
        runner.ok("git", &["tag", "-l", "baseline-v1.0.0"], "baseline-v1.0.0\n");

        let (temp, store) = store_with(runner);
        store.save(&Baseline::new("m1", "2.0.0")).unwrap();

        store
            .restore("baseline-v1.0.0", RestoreOptions::default())
            .await
            .unwrap();

        let backups: Vec<_> = std::fs::read_dir(temp.path().join(".rollback"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("sync-config.ref.backup."))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[tokio::test]
    async fn test_restore_from_backup_file() {
        let runner = Arc::new(FakeRunner::new());
        let (temp, store) = store_with(runner);

        let old = Baseline::new("m1", "1.0.0");
        let backup_path = temp.path().join("old-baseline.json");
        std::fs::write(&backup_path, serde_json::to_string_pretty(&old).unwrap()).unwrap();

        store.save(&Baseline::new("m1", "2.0.0")).unwrap();
        let restored = store
            .restore(
                backup_path.to_str().unwrap(),
                RestoreOptions {
                    create_backup: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(restored.version, "1.0.0");
        assert_eq!(store.load().unwrap().version, "1.0.0");
    }

    #[tokio::test]
    async fn test_restore_rejects_invalid_payload() {
        let runner = Arc::new(FakeRunner::new());
        let (temp, store) = seeded_store(runner);
        let before = store.load().unwrap();

        let bad_path = temp.path().join("bad.json");
        std::fs::write(&bad_path, r#"{"machine_id": "m1"}"#).unwrap();

        let err = store
            .restore(bad_path.to_str().unwrap(), RestoreOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPayload { .. }));
        assert_eq!(store.load().unwrap(), before);
    }
}
