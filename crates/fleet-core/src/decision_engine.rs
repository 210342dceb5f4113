//! Decision lifecycle: create, approve, reject, apply, rollback.
//!
//! Apply and rollback are serialized per decision id: a second concurrent
//! call for the same decision waits on its mutex, while other decisions
//! proceed. A failed real apply transiently marks the decision `Failed`,
//! restores from its rollback point, and on success returns it to `Pending`
//! so it can be retried; if the restore itself fails the decision stays
//! `Failed` for manual intervention.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use tokio::sync::Mutex;

use fleet_baseline::{Baseline, BaselineConfig, BaselineStore};
use fleet_fs::SharedRoot;
use fleet_roadmap::{
    AppliedChanges, Decision, DecisionKind, DecisionStatus, Roadmap, RoadmapStore, Targets,
};
use fleet_rollback::RollbackManager;

use crate::error::{Error, Result};
use crate::json;

/// Config sections a decision payload may touch.
const CONFIG_SECTIONS: [&str; 4] = ["roo", "hardware", "software", "system"];

/// Parameters for a new decision proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDecision {
    pub title: String,
    pub kind: DecisionKind,
    pub path: Option<String>,
    pub targets: Targets,
    pub description: Option<String>,
    pub diff: Option<String>,
}

/// Options for [`DecisionEngine::apply`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Simulate: compute and report effects, touch nothing, advance nothing.
    pub dry_run: bool,
    /// Skip the conflict check.
    pub force: bool,
}

/// Outcome of an apply attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    pub decision_id: String,
    pub success: bool,
    pub dry_run: bool,
    /// Decision status after the attempt.
    pub status: DecisionStatus,
    pub changes: AppliedChanges,
    pub execution_log: Vec<String>,
    pub error: Option<String>,
}

/// Outcome of an explicit rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackOutcome {
    pub decision_id: String,
    pub success: bool,
    pub restored_files: Vec<String>,
    pub logs: Vec<String>,
    pub error: Option<String>,
}

/// Pluggable conflict detection for `apply`.
///
/// Returns a human-readable reason when the decision should not be applied
/// against the current shared state. `force: true` skips the check entirely.
pub trait ConflictChecker: Send + Sync {
    fn check(&self, decision: &Decision, baseline: Option<&Baseline>) -> Option<String>;
}

/// Default checker: flags a decision authored against a stale baseline.
pub struct BaselineFreshnessChecker;

impl ConflictChecker for BaselineFreshnessChecker {
    fn check(&self, decision: &Decision, baseline: Option<&Baseline>) -> Option<String> {
        let baseline = baseline?;
        if baseline.last_updated > decision.created_at {
            Some(format!(
                "baseline was updated at {} after the decision was created at {}",
                baseline.last_updated, decision.created_at
            ))
        } else {
            None
        }
    }
}

/// One file the apply will write.
struct PlannedWrite {
    /// Path relative to the shared root.
    path: String,
    content: String,
    existed: bool,
}

/// Owns the decision lifecycle.
pub struct DecisionEngine {
    root: SharedRoot,
    store: RoadmapStore,
    baselines: Arc<BaselineStore>,
    rollbacks: Arc<RollbackManager>,
    machine_id: String,
    conflict_checker: Box<dyn ConflictChecker>,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DecisionEngine {
    pub fn new(
        root: SharedRoot,
        store: RoadmapStore,
        baselines: Arc<BaselineStore>,
        rollbacks: Arc<RollbackManager>,
        machine_id: impl Into<String>,
    ) -> Self {
        Self {
            root,
            store,
            baselines,
            rollbacks,
            machine_id: machine_id.into(),
            conflict_checker: Box::new(BaselineFreshnessChecker),
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Swap in a different conflict detection strategy.
    pub fn with_conflict_checker(mut self, checker: Box<dyn ConflictChecker>) -> Self {
        self.conflict_checker = checker;
        self
    }

    /// Propose a new decision. Allocates the next id and records it pending.
    pub fn create(&self, params: NewDecision) -> Result<Decision> {
        let mut roadmap = self.load_roadmap()?;
        let id = roadmap.next_id();

        let mut decision = Decision::new(
            id,
            params.title,
            params.kind,
            self.machine_id.clone(),
            params.targets,
            now_secs(),
        );
        decision.path = params.path;
        decision.description = params.description;
        decision.diff = params.diff;

        roadmap.upsert(decision.clone());
        self.store.save(&roadmap)?;
        tracing::info!(decision = %decision.id, title = %decision.title, "decision created");
        Ok(decision)
    }

    /// Approve a pending decision.
    pub fn approve(&self, id: &str, approved_by: &str) -> Result<Decision> {
        let mut decision = self.get(id)?;
        self.ensure_transition(&decision, DecisionStatus::Approved)?;

        decision.status = DecisionStatus::Approved;
        decision.approved_at = Some(now_secs());
        decision.approved_by = Some(approved_by.to_string());
        self.store.put(decision.clone())?;
        tracing::info!(decision = %id, by = %approved_by, "decision approved");
        Ok(decision)
    }

    /// Reject a pending decision with a reason.
    pub fn reject(&self, id: &str, reason: &str, rejected_by: &str) -> Result<Decision> {
        let mut decision = self.get(id)?;
        self.ensure_transition(&decision, DecisionStatus::Rejected)?;

        decision.status = DecisionStatus::Rejected;
        decision.rejected_at = Some(now_secs());
        decision.rejected_by = Some(rejected_by.to_string());
        decision.reject_reason = Some(reason.to_string());
        self.store.put(decision.clone())?;
        tracing::info!(decision = %id, by = %rejected_by, "decision rejected");
        Ok(decision)
    }

    /// Apply an approved decision to the shared state.
    pub async fn apply(&self, id: &str, opts: ApplyOptions) -> Result<ApplyResult> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let decision = self.get(id)?;
        if decision.status != DecisionStatus::Approved {
            return Err(Error::DecisionNotApproved {
                id: id.to_string(),
                status: decision.status,
            });
        }

        let plan = self.plan_writes(&decision)?;

        if opts.dry_run {
            return self.simulate(&decision, &plan);
        }

        if !opts.force {
            let baseline = self.load_baseline_if_any()?;
            if let Some(reason) = self.conflict_checker.check(&decision, baseline.as_ref()) {
                return Err(Error::Conflict {
                    id: id.to_string(),
                    reason,
                });
            }
        }

        let files: Vec<String> = plan.iter().map(|w| w.path.clone()).collect();
        self.rollbacks.create_rollback_point(id, &files)?;
        let mut log = vec![format!("rollback point created for {} file(s)", files.len())];

        match self.execute_plan(&decision, &plan, &mut log) {
            Ok(changes) => {
                tracing::info!(decision = %id, files = changes.total(), "decision applied");
                Ok(ApplyResult {
                    decision_id: id.to_string(),
                    success: true,
                    dry_run: false,
                    status: DecisionStatus::Applied,
                    changes,
                    execution_log: log,
                    error: None,
                })
            }
            Err(reason) => self.recover_failed_apply(decision, reason, log),
        }
    }

    /// Roll an applied decision back to its pre-apply state.
    pub async fn rollback(
        &self,
        id: &str,
        reason: &str,
        rolled_back_by: &str,
    ) -> Result<RollbackOutcome> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut decision = self.get(id)?;
        if decision.status != DecisionStatus::Applied {
            return Err(Error::IllegalTransition {
                id: id.to_string(),
                from: decision.status,
                to: DecisionStatus::RolledBack,
            });
        }

        let report = self.rollbacks.restore_from_rollback_point(id);
        if !report.success {
            return Ok(RollbackOutcome {
                decision_id: id.to_string(),
                success: false,
                restored_files: report.restored_files,
                logs: report.logs,
                error: report.error,
            });
        }

        decision.status = DecisionStatus::RolledBack;
        decision.rolled_back_at = Some(now_secs());
        decision.rolled_back_by = Some(rolled_back_by.to_string());
        decision.rollback_reason = Some(reason.to_string());
        self.store.put(decision)?;

        tracing::info!(decision = %id, %reason, "decision rolled back");
        Ok(RollbackOutcome {
            decision_id: id.to_string(),
            success: true,
            restored_files: report.restored_files,
            logs: report.logs,
            error: None,
        })
    }

    /// One decision by id.
    pub fn decision(&self, id: &str) -> Result<Decision> {
        self.get(id)
    }

    /// All decisions, in roadmap order.
    pub fn decisions(&self) -> Result<Vec<Decision>> {
        Ok(self.load_roadmap()?.decisions)
    }

    fn load_roadmap(&self) -> Result<Roadmap> {
        Ok(self.store.load()?)
    }

    fn get(&self, id: &str) -> Result<Decision> {
        self.store.get(id).map_err(|e| match e {
            fleet_roadmap::Error::DecisionNotFound { id } => Error::DecisionNotFound { id },
            other => Error::Roadmap(other),
        })
    }

    fn ensure_transition(&self, decision: &Decision, to: DecisionStatus) -> Result<()> {
        if decision.status.may_transition_to(to) {
            Ok(())
        } else {
            Err(Error::IllegalTransition {
                id: decision.id.clone(),
                from: decision.status,
                to,
            })
        }
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("decision lock map poisoned");
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn load_baseline_if_any(&self) -> Result<Option<Baseline>> {
        match self.baselines.load() {
            Ok(baseline) => Ok(Some(baseline)),
            Err(fleet_baseline::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Compute the exact files and contents this decision would write.
    fn plan_writes(&self, decision: &Decision) -> Result<Vec<PlannedWrite>> {
        let invalid = |reason: &str| Error::DecisionInvalid {
            id: decision.id.clone(),
            reason: reason.to_string(),
        };

        let diff = decision
            .diff
            .as_ref()
            .ok_or_else(|| invalid("missing diff payload"))?;

        match decision.kind {
            DecisionKind::File => {
                let path = decision
                    .path
                    .as_ref()
                    .ok_or_else(|| invalid("file decision has no target path"))?;
                let existed = self.root.resolve(path)?.exists();
                Ok(vec![PlannedWrite {
                    path: path.clone(),
                    content: diff.clone(),
                    existed,
                }])
            }

            DecisionKind::Config => {
                let patch: serde_json::Value = serde_json::from_str(diff)
                    .map_err(|e| invalid(&format!("diff is not valid JSON: {e}")))?;
                let patch_map = patch
                    .as_object()
                    .ok_or_else(|| invalid("config payload must be a JSON object"))?;
                for key in patch_map.keys() {
                    if !CONFIG_SECTIONS.contains(&key.as_str()) {
                        return Err(invalid(&format!("unknown config section {key:?}")));
                    }
                }

                let baseline = self.baselines.load()?;
                let mut config = config_value(&baseline.config);
                json::deep_merge(&mut config, &patch);
                self.baseline_write(baseline, config, &decision.id)
            }

            DecisionKind::Setting => {
                let path = decision
                    .path
                    .as_ref()
                    .ok_or_else(|| invalid("setting decision has no key path"))?;
                let section = path.split('.').next().unwrap_or_default();
                if !CONFIG_SECTIONS.contains(&section) {
                    return Err(invalid(&format!(
                        "setting path must start with a config section, got {section:?}"
                    )));
                }
                let value: serde_json::Value = serde_json::from_str(diff)
                    .map_err(|e| invalid(&format!("diff is not a JSON value: {e}")))?;

                let baseline = self.baselines.load()?;
                let mut config = config_value(&baseline.config);
                json::set_path(&mut config, path, value).map_err(|e| invalid(&e))?;
                self.baseline_write(baseline, config, &decision.id)
            }
        }
    }

    /// Plan the baseline rewrite shared by config and setting decisions.
    fn baseline_write(
        &self,
        mut baseline: Baseline,
        new_config: serde_json::Value,
        decision_id: &str,
    ) -> Result<Vec<PlannedWrite>> {
        baseline.config =
            serde_json::from_value::<BaselineConfig>(new_config).map_err(|e| {
                Error::DecisionInvalid {
                    id: decision_id.to_string(),
                    reason: format!("merged config lost a section: {e}"),
                }
            })?;
        baseline.last_updated = Utc::now();

        let content =
            serde_json::to_string_pretty(&baseline).map_err(|e| Error::DecisionInvalid {
                id: decision_id.to_string(),
                reason: format!("could not serialize baseline: {e}"),
            })?;

        Ok(vec![PlannedWrite {
            path: fleet_fs::layout::BASELINE_FILE.to_string(),
            content,
            existed: true,
        }])
    }

    /// Dry run: render previews, advance nothing, report zero changes.
    fn simulate(&self, decision: &Decision, plan: &[PlannedWrite]) -> Result<ApplyResult> {
        let mut log = Vec::new();
        for write in plan {
            let old = if write.existed {
                fleet_fs::read_text(&self.root.resolve(&write.path)?)?
            } else {
                String::new()
            };
            let verb = if write.existed { "modify" } else { "create" };
            log.push(format!("[dry-run] Would {verb} {}", write.path));

            let preview = TextDiff::from_lines(&old, &write.content)
                .unified_diff()
                .header(&write.path, &write.path)
                .to_string();
            if !preview.is_empty() {
                log.push(preview);
            }
        }

        tracing::info!(decision = %decision.id, "apply simulated");
        Ok(ApplyResult {
            decision_id: decision.id.clone(),
            success: true,
            dry_run: true,
            status: decision.status,
            changes: AppliedChanges::default(),
            execution_log: log,
            error: None,
        })
    }

    /// Write every planned file, then record the applied decision. Any
    /// failure aborts with a reason; the caller owns recovery.
    fn execute_plan(
        &self,
        decision: &Decision,
        plan: &[PlannedWrite],
        log: &mut Vec<String>,
    ) -> std::result::Result<AppliedChanges, String> {
        let mut changes = AppliedChanges::default();

        for write in plan {
            let target = self
                .root
                .resolve(&write.path)
                .map_err(|e| format!("refused target {}: {e}", write.path))?;
            fleet_fs::write_text(&target, &write.content)
                .map_err(|e| format!("failed to write {}: {e}", write.path))?;

            if write.existed {
                changes.files_modified.push(write.path.clone());
            } else {
                changes.files_created.push(write.path.clone());
            }
            log.push(format!("wrote {}", write.path));
        }

        let mut applied = decision.clone();
        applied.status = DecisionStatus::Applied;
        applied.applied_at = Some(now_secs());
        applied.applied_by = Some(self.machine_id.clone());
        applied.changes = Some(changes.clone());
        self.store
            .put(applied)
            .map_err(|e| format!("failed to record applied decision: {e}"))?;
        log.push(format!("decision {} recorded as applied", decision.id));

        Ok(changes)
    }

    /// Automatic best-effort rollback after a failed apply.
    fn recover_failed_apply(
        &self,
        mut decision: Decision,
        reason: String,
        mut log: Vec<String>,
    ) -> Result<ApplyResult> {
        tracing::error!(
            decision = %decision.id,
            %reason,
            "apply failed, attempting automatic rollback"
        );
        log.push(reason.clone());

        decision.status = DecisionStatus::Failed;
        self.store.put(decision.clone())?;

        let report = self.rollbacks.restore_from_rollback_point(&decision.id);
        log.extend(report.logs);

        let status = if report.success {
            decision.status = DecisionStatus::Pending;
            self.store.put(decision.clone())?;
            log.push("automatic rollback succeeded, decision returned to pending".to_string());
            DecisionStatus::Pending
        } else {
            log.push(format!(
                "automatic rollback failed: {}",
                report.error.unwrap_or_else(|| "unknown".to_string())
            ));
            tracing::error!(decision = %decision.id, "automatic rollback failed, manual intervention required");
            DecisionStatus::Failed
        };

        Ok(ApplyResult {
            decision_id: decision.id,
            success: false,
            dry_run: false,
            status,
            changes: AppliedChanges::default(),
            execution_log: log,
            error: Some(reason),
        })
    }
}

/// Roadmap timestamps are rendered at whole-second precision, so truncate at
/// the source to keep persisted and in-memory decisions identical.
fn now_secs() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

fn config_value(config: &BaselineConfig) -> serde_json::Value {
    serde_json::json!({
        "roo": config.roo,
        "hardware": config.hardware,
        "software": config.software,
        "system": config.system,
    })
}
