//! The `TestState` fixture: an engine over a temporary shared root.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use fleet_baseline::Baseline;
use fleet_core::{SyncConfig, SyncEngine};
use fleet_roadmap::{Decision, DecisionKind, Targets};
use fleet_runner::fake::FakeRunner;

/// An engine wired to a temp shared root and a scripted runner.
///
/// The temp directory lives as long as the fixture; dropping it removes the
/// shared root.
pub struct TestState {
    pub temp: TempDir,
    pub runner: Arc<FakeRunner>,
    pub engine: SyncEngine,
}

impl TestState {
    /// Fast liveness thresholds (10 s interval, warning 30 s, offline 60 s)
    /// and the machine id `local`.
    pub fn new() -> Self {
        Self::with_machine("local")
    }

    pub fn with_machine(machine_id: &str) -> Self {
        crate::logging::init();

        let temp = TempDir::new().expect("temp dir");
        let mut config = SyncConfig::new(temp.path(), machine_id);
        config.heartbeat.interval_secs = 10;
        config.heartbeat.warning_threshold_secs = 30;
        config.heartbeat.offline_threshold_secs = 60;

        let runner = Arc::new(FakeRunner::new());
        let engine = SyncEngine::new(config, runner.clone()).expect("engine");

        Self {
            temp,
            runner,
            engine,
        }
    }

    /// Seed an active baseline whose `last_updated` lies in the past, so
    /// freshly created decisions pass the freshness conflict check.
    pub fn seed_baseline(&self, version: &str) -> Baseline {
        let mut baseline = Baseline::new(self.engine.machine_id(), version);
        baseline.last_updated = Utc::now() - Duration::hours(1);
        self.engine.baselines().save(&baseline).expect("seed baseline");
        baseline
    }

    /// Create and approve a file decision ready to apply.
    pub fn approved_file_decision(&self, path: &str, content: &str) -> Decision {
        let decision = self
            .engine
            .decisions()
            .create(fleet_core::NewDecision {
                title: format!("Write {path}"),
                kind: DecisionKind::File,
                path: Some(path.to_string()),
                targets: Targets::All,
                description: None,
                diff: Some(content.to_string()),
            })
            .expect("create decision");
        self.engine
            .decisions()
            .approve(&decision.id, "reviewer")
            .expect("approve decision")
    }

    /// Push a machine into the offline state by back-dating its heartbeat
    /// and sweeping, routing transitions to the coordinator.
    pub async fn force_offline(&self, machine_id: &str) {
        {
            let mut registry = self.engine.registry().write().await;
            registry.register_heartbeat(machine_id, None, Utc::now() - Duration::seconds(90));
        }
        self.engine.evaluate_heartbeats().await;
    }
}

impl Default for TestState {
    fn default() -> Self {
        Self::new()
    }
}
