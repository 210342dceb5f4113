//! The `SyncEngine` context object.
//!
//! One engine is constructed at process start and passed by reference to
//! every handler; tests build a fresh engine per case. There is no global
//! singleton to reset.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use fleet_baseline::BaselineStore;
use fleet_fs::SharedRoot;
use fleet_heartbeat::{HeartbeatRegistry, MachineHeartbeat, RegistryState, Transition};
use fleet_roadmap::RoadmapStore;
use fleet_rollback::RollbackManager;
use fleet_runner::{CommandRunner, ProcessRunner};

use crate::config::SyncConfig;
use crate::coordinator::SyncEventCoordinator;
use crate::decision_engine::DecisionEngine;
use crate::error::Result;

/// Liveness proof written to the shared root on each heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HeartbeatProof {
    machine_id: String,
    at: DateTime<Utc>,
    version: Option<String>,
}

/// Top-level context wiring the registry, stores, and engines together.
pub struct SyncEngine {
    config: SyncConfig,
    root: SharedRoot,
    registry: Arc<RwLock<HeartbeatRegistry>>,
    baselines: Arc<BaselineStore>,
    rollbacks: Arc<RollbackManager>,
    decisions: DecisionEngine,
    coordinator: SyncEventCoordinator,
}

impl SyncEngine {
    /// Build an engine over the configured shared root, injecting the
    /// command runner (tests pass a fake).
    pub fn new(config: SyncConfig, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let root = SharedRoot::new(&config.shared_root)?;
        let registry = Arc::new(RwLock::new(HeartbeatRegistry::new(
            config.heartbeat_config(),
        )));
        let baselines = Arc::new(BaselineStore::new(
            root.clone(),
            runner,
            config.command_timeout(),
        ));
        let rollbacks = Arc::new(RollbackManager::new(root.clone()));
        let decisions = DecisionEngine::new(
            root.clone(),
            RoadmapStore::new(root.roadmap_file()),
            baselines.clone(),
            rollbacks.clone(),
            config.machine_id.clone(),
        );
        let coordinator = SyncEventCoordinator::new(registry.clone(), baselines.clone());

        tracing::info!(
            root = %root.path().display(),
            machine = %config.machine_id,
            "sync engine ready"
        );

        Ok(Self {
            config,
            root,
            registry,
            baselines,
            rollbacks,
            decisions,
            coordinator,
        })
    }

    /// Build an engine with the production process runner.
    pub fn with_process_runner(config: SyncConfig) -> Result<Self> {
        let runner = Arc::new(ProcessRunner::new(config.command_timeout()));
        Self::new(config, runner)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn machine_id(&self) -> &str {
        &self.config.machine_id
    }

    pub fn root(&self) -> &SharedRoot {
        &self.root
    }

    pub fn registry(&self) -> &Arc<RwLock<HeartbeatRegistry>> {
        &self.registry
    }

    pub fn baselines(&self) -> &BaselineStore {
        &self.baselines
    }

    pub fn rollbacks(&self) -> &RollbackManager {
        &self.rollbacks
    }

    pub fn decisions(&self) -> &DecisionEngine {
        &self.decisions
    }

    pub fn coordinator(&self) -> &SyncEventCoordinator {
        &self.coordinator
    }

    /// Record a heartbeat from a machine.
    ///
    /// Infallible by design: this is called opportunistically from unrelated
    /// tool invocations as a low-cost liveness proof, so it must never block
    /// or fail the caller's primary operation. The in-memory upsert is
    /// immediate; the shared-storage proof file is written by a spawned task
    /// raced against a short timeout, and its outcome is only logged.
    pub async fn register_heartbeat(
        &self,
        machine_id: &str,
        version: Option<&str>,
    ) -> Option<Transition> {
        let now = Utc::now();
        let transition = self
            .registry
            .write()
            .await
            .register_heartbeat(machine_id, version, now);

        if let Some(transition) = &transition {
            self.coordinator.note_transition(transition);
        }

        self.spawn_heartbeat_write(machine_id, version.map(str::to_string), now);
        transition
    }

    /// Sweep the registry against the liveness thresholds and hand every
    /// transition to the coordinator.
    pub async fn evaluate_heartbeats(&self) -> Vec<Transition> {
        let transitions = self.registry.write().await.evaluate(Utc::now());
        for transition in &transitions {
            self.coordinator.note_transition(transition);
        }
        transitions
    }

    pub async fn heartbeat_state(&self) -> RegistryState {
        self.registry.read().await.state()
    }

    pub async fn offline_machines(&self) -> Vec<MachineHeartbeat> {
        self.registry.read().await.offline_machines()
    }

    pub async fn warning_machines(&self) -> Vec<MachineHeartbeat> {
        self.registry.read().await.warning_machines()
    }

    /// Fire-and-forget write of the liveness proof file.
    fn spawn_heartbeat_write(
        &self,
        machine_id: &str,
        version: Option<String>,
        at: DateTime<Utc>,
    ) {
        let path = self.root.heartbeat_file(machine_id);
        let timeout = self.config.heartbeat_write_timeout();
        let proof = HeartbeatProof {
            machine_id: machine_id.to_string(),
            at,
            version,
        };

        tokio::spawn(async move {
            let machine = proof.machine_id.clone();
            let write = tokio::task::spawn_blocking(move || fleet_fs::write_json(&path, &proof));

            match tokio::time::timeout(timeout, write).await {
                Ok(Ok(Ok(()))) => {
                    tracing::debug!(machine = %machine, "heartbeat proof written");
                }
                Ok(Ok(Err(e))) => {
                    tracing::warn!(machine = %machine, error = %e, "heartbeat proof write failed");
                }
                Ok(Err(e)) => {
                    tracing::warn!(machine = %machine, error = %e, "heartbeat proof task died");
                }
                Err(_) => {
                    tracing::warn!(machine = %machine, ?timeout, "heartbeat proof write timed out");
                }
            }
        });
    }
}
