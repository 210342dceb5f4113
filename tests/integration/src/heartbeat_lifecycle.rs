//! End-to-end: a machine falls silent, is synced offline, then returns.

use fleet_core::{OfflineSyncOptions, OnlineSyncOptions};
use fleet_heartbeat::MachineStatus;
use fleet_test_utils::TestState;

#[tokio::test]
async fn machine_offline_then_online_round_trip() {
    let state = TestState::new();
    state.seed_baseline("1.0.0");

    // M1 proves it is alive, then goes silent past the offline threshold.
    state.force_offline("M1").await;

    let offline = state.engine.offline_machines().await;
    assert_eq!(offline.len(), 1);
    assert_eq!(offline[0].machine_id, "M1");
    assert!(offline[0].offline_since.is_some());

    // Offline sync succeeds and backs up the baseline.
    let result = state
        .engine
        .coordinator()
        .sync_on_offline("M1", OfflineSyncOptions::default())
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.changes.files_synced, 1);
    assert!(result.backup_path.is_some());

    // M1 comes back.
    let transition = state.engine.register_heartbeat("M1", None).await;
    assert!(transition.is_some(), "return from offline must announce itself");
    assert!(state.engine.offline_machines().await.is_empty());

    let snapshot = state.engine.heartbeat_state().await;
    assert_eq!(snapshot.total_machines, 1);
    assert_eq!(snapshot.machines[0].status, MachineStatus::Online);
    assert_eq!(snapshot.machines[0].missed_heartbeats, 0);

    // Online sync reports how long the machine was away.
    let result = state
        .engine
        .coordinator()
        .sync_on_online("M1", OnlineSyncOptions::default())
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.changes.files_synced, 1);

    let duration = result
        .changes
        .offline_duration_secs
        .expect("offline episode must yield a duration");
    assert!((0..=5).contains(&duration), "duration was {duration}");
}

#[tokio::test]
async fn sync_preconditions_are_enforced() {
    let state = TestState::new();
    state.seed_baseline("1.0.0");

    // Online machine: offline sync must refuse.
    state.engine.register_heartbeat("M1", None).await;
    let err = state
        .engine
        .coordinator()
        .sync_on_offline("M1", OfflineSyncOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "MACHINE_NOT_OFFLINE");

    // Offline machine: online sync must refuse.
    state.force_offline("M2").await;
    let err = state
        .engine
        .coordinator()
        .sync_on_online("M2", OnlineSyncOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "MACHINE_NOT_ONLINE");
}

#[tokio::test]
async fn dry_run_sync_events_touch_nothing() {
    let state = TestState::new();
    state.seed_baseline("1.0.0");
    state.force_offline("M1").await;

    let result = state
        .engine
        .coordinator()
        .sync_on_offline(
            "M1",
            OfflineSyncOptions {
                create_backup: true,
                dry_run: true,
            },
        )
        .await
        .unwrap();
    assert!(result.simulated);
    assert_eq!(result.changes.files_synced, 0);

    let backups: Vec<_> = std::fs::read_dir(state.temp.path().join(".rollback"))
        .unwrap()
        .collect();
    assert!(backups.is_empty(), "dry run must not write a backup");
}
