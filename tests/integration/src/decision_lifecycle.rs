//! End-to-end: the full decision lifecycle against real shared state.

use fleet_core::{ApplyOptions, NewDecision};
use fleet_roadmap::{DecisionKind, DecisionStatus, Targets};
use fleet_test_utils::TestState;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn full_lifecycle_apply_then_rollback() {
    let state = TestState::new();
    std::fs::write(state.temp.path().join("notes.txt"), "original").unwrap();

    // Propose.
    let decision = state
        .engine
        .decisions()
        .create(NewDecision {
            title: "Replace notes".into(),
            kind: DecisionKind::File,
            path: Some("notes.txt".into()),
            targets: Targets::All,
            description: Some("First shared change".into()),
            diff: Some("replaced".into()),
        })
        .unwrap();
    assert_eq!(decision.id, "DEC-001");
    assert_eq!(decision.status, DecisionStatus::Pending);

    // Apply before approval must fail and change nothing.
    let err = state
        .engine
        .decisions()
        .apply(&decision.id, ApplyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DECISION_NOT_APPROVED");
    assert_eq!(
        std::fs::read_to_string(state.temp.path().join("notes.txt")).unwrap(),
        "original"
    );

    // Approve, then dry run: zero changes, status still approved.
    state.engine.decisions().approve(&decision.id, "M2").unwrap();
    let dry = state
        .engine
        .decisions()
        .apply(
            &decision.id,
            ApplyOptions {
                dry_run: true,
                force: false,
            },
        )
        .await
        .unwrap();
    assert!(dry.success && dry.dry_run);
    assert_eq!(dry.changes.total(), 0);
    assert_eq!(
        state.engine.decisions().decision(&decision.id).unwrap().status,
        DecisionStatus::Approved
    );

    // Real apply: file replaced, rollback point recorded.
    let applied = state
        .engine
        .decisions()
        .apply(&decision.id, ApplyOptions::default())
        .await
        .unwrap();
    assert!(applied.success);
    assert_eq!(applied.status, DecisionStatus::Applied);
    assert_eq!(applied.changes.files_modified, vec!["notes.txt"]);
    assert_eq!(
        std::fs::read_to_string(state.temp.path().join("notes.txt")).unwrap(),
        "replaced"
    );
    assert!(state.engine.rollbacks().has_rollback_point(&decision.id));

    // Rollback: pre-apply content returns, decision terminal.
    let outcome = state
        .engine
        .decisions()
        .rollback(&decision.id, "regression observed", "M2")
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(
        std::fs::read_to_string(state.temp.path().join("notes.txt")).unwrap(),
        "original"
    );

    let stored = state.engine.decisions().decision(&decision.id).unwrap();
    assert_eq!(stored.status, DecisionStatus::RolledBack);
    assert_eq!(stored.rollback_reason.as_deref(), Some("regression observed"));
}

#[tokio::test]
async fn lifecycle_survives_the_roadmap_round_trip() {
    let state = TestState::new();
    let decision = state.approved_file_decision("profiles/aliases.sh", "alias ll='ls -al'\n");

    // Everything above went through sync-roadmap.md; parse it back cold.
    let store = fleet_roadmap::RoadmapStore::new(state.engine.root().roadmap_file());
    let roadmap = store.load().unwrap();
    assert_eq!(roadmap.decisions.len(), 1);
    assert_eq!(roadmap.decisions[0], decision);
}

#[tokio::test]
async fn config_decision_flows_into_the_baseline() {
    let state = TestState::new();
    state.seed_baseline("1.0.0");

    let decision = state
        .engine
        .decisions()
        .create(NewDecision {
            title: "Adopt shared modes".into(),
            kind: DecisionKind::Config,
            path: None,
            targets: Targets::Machines(vec!["local".into()]),
            description: None,
            diff: Some(r#"{"roo": {"modes": {"ask": true}}, "system": {"tz": "UTC"}}"#.into()),
        })
        .unwrap();
    state.engine.decisions().approve(&decision.id, "M2").unwrap();

    let result = state
        .engine
        .decisions()
        .apply(&decision.id, ApplyOptions::default())
        .await
        .unwrap();
    assert!(result.success);

    let baseline = state.engine.baselines().load().unwrap();
    assert_eq!(baseline.config.roo, serde_json::json!({"modes": {"ask": true}}));
    assert_eq!(baseline.config.system, serde_json::json!({"tz": "UTC"}));

    // Rollback restores the pre-apply baseline sections.
    state
        .engine
        .decisions()
        .rollback(&decision.id, "reverting trial", "M2")
        .await
        .unwrap();
    let baseline = state.engine.baselines().load().unwrap();
    assert_eq!(baseline.config.roo, serde_json::json!({}));
}
