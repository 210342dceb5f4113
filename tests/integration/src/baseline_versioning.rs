//! End-to-end: baseline version markers and restores.

use fleet_baseline::{RestoreOptions, VersionOptions};
use fleet_test_utils::TestState;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn invalid_version_fails_before_touching_git() {
    let state = TestState::new();
    state.seed_baseline("1.0.0");

    let err = state
        .engine
        .baselines()
        .version("two-point-oh", VersionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, fleet_baseline::Error::InvalidVersion { .. }));
    assert!(state.runner.calls().is_empty());
}

#[tokio::test]
async fn version_then_repeat_fails() {
    let state = TestState::new();
    state.seed_baseline("1.0.0");

    let receipt = state
        .engine
        .baselines()
        .version("2.0.0", VersionOptions::default())
        .await
        .unwrap();
    assert_eq!(receipt.tag, "baseline-v2.0.0");
    assert!(state.runner.saw("git", &["tag", "-a", "baseline-v2.0.0"]));
    assert_eq!(state.engine.baselines().load().unwrap().version, "2.0.0");

    // The marker now exists in git; a second attempt must refuse.
    state
        .runner
        .ok("git", &["tag", "-l", "baseline-v2.0.0"], "baseline-v2.0.0\n");
    let err = state
        .engine
        .baselines()
        .version("2.0.0", VersionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, fleet_baseline::Error::TagExists { .. }));
}

#[tokio::test]
async fn restore_from_tag_is_content_idempotent() {
    let state = TestState::new();
    let original = state.seed_baseline("1.0.0");
    let payload = serde_json::to_string_pretty(&original).unwrap();

    state.runner.ok(
        "git",
        &["tag", "-l", "--format=%(contents)", "baseline-v1.0.0"],
        &format!("Baseline 1.0.0\n\n{payload}"),
    );
    state
        .runner
        .ok("git", &["tag", "-l", "baseline-v1.0.0"], "baseline-v1.0.0\n");

    // Drift the active baseline, then restore the marker twice.
    state.seed_baseline("3.0.0");
    let first = state
        .engine
        .baselines()
        .restore("baseline-v1.0.0", RestoreOptions::default())
        .await
        .unwrap();
    let second = state
        .engine
        .baselines()
        .restore("baseline-v1.0.0", RestoreOptions::default())
        .await
        .unwrap();

    assert_eq!(first.config, second.config);
    assert_eq!(state.engine.baselines().load().unwrap().version, "1.0.0");
}

#[tokio::test]
async fn restore_from_missing_backup_changes_nothing() {
    let state = TestState::new();
    state.seed_baseline("1.0.0");
    let before = state.engine.baselines().load().unwrap();

    let missing = state.temp.path().join("no-such-backup.json");
    let err = state
        .engine
        .baselines()
        .restore(missing.to_str().unwrap(), RestoreOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, fleet_baseline::Error::BackupNotFound { .. }));
    assert_eq!(state.engine.baselines().load().unwrap(), before);
}

#[tokio::test]
async fn versioning_writes_the_changelog() {
    let state = TestState::new();
    state.seed_baseline("1.0.0");

    state
        .engine
        .baselines()
        .version(
            "1.1.0",
            VersionOptions {
                message: Some("Tighten terminal profile".into()),
                push_tags: false,
                create_changelog: true,
            },
        )
        .await
        .unwrap();

    let changelog =
        std::fs::read_to_string(state.temp.path().join("CHANGELOG-baseline.md")).unwrap();
    assert!(changelog.starts_with("# Baseline Changelog"));
    assert!(changelog.contains("## baseline-v1.1.0"));
    assert!(changelog.contains("Tighten terminal profile"));
}
