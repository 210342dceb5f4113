//! Per-machine liveness state and the classification sweep.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::HeartbeatConfig;

/// Liveness classification of one machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Online,
    Warning,
    Offline,
}

/// Bookkeeping carried alongside each machine entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMetadata {
    /// When the machine was first seen by this registry.
    pub first_seen: DateTime<Utc>,
    /// When the entry was last mutated (heartbeat or sweep).
    pub last_updated: DateTime<Utc>,
    /// Software version the machine reported, if any.
    pub version: Option<String>,
}

/// Liveness state of one machine. Entries are created on the first heartbeat
/// seen for a machine and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineHeartbeat {
    pub machine_id: String,
    pub last_heartbeat: DateTime<Utc>,
    pub status: MachineStatus,
    pub missed_heartbeats: u32,
    /// Present iff `status` is `Offline`. Set on the sweep that crossed the
    /// offline threshold and never moved afterwards.
    pub offline_since: Option<DateTime<Utc>>,
    pub metadata: HeartbeatMetadata,
}

/// A status-boundary crossing observed by the registry.
///
/// `BecameOnline` carries the `offline_since` the machine had before the
/// heartbeat cleared it, so consumers can compute the offline duration after
/// the registry state has already been reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    BecameOnline {
        machine_id: String,
        at: DateTime<Utc>,
        offline_since: Option<DateTime<Utc>>,
    },
    BecameWarning {
        machine_id: String,
        at: DateTime<Utc>,
    },
    BecameOffline {
        machine_id: String,
        at: DateTime<Utc>,
    },
}

impl Transition {
    pub fn machine_id(&self) -> &str {
        match self {
            Self::BecameOnline { machine_id, .. }
            | Self::BecameWarning { machine_id, .. }
            | Self::BecameOffline { machine_id, .. } => machine_id,
        }
    }
}

/// Aggregated snapshot of the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryState {
    pub machines: Vec<MachineHeartbeat>,
    pub total_machines: usize,
    pub online_count: usize,
    pub warning_count: usize,
    pub offline_count: usize,
    pub last_heartbeat_check: Option<DateTime<Utc>>,
}

/// In-memory table of per-machine liveness state.
#[derive(Debug)]
pub struct HeartbeatRegistry {
    config: HeartbeatConfig,
    machines: HashMap<String, MachineHeartbeat>,
    last_check: Option<DateTime<Utc>>,
}

impl HeartbeatRegistry {
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            machines: HashMap::new(),
            last_check: None,
        }
    }

    /// Record a heartbeat from `machine_id` at `now`.
    ///
    /// Upserts the entry, resets `missed_heartbeats` to 0 and the status to
    /// `Online`. If the machine was offline, clears `offline_since` and
    /// returns the became-online transition — exactly once per offline
    /// episode.
    pub fn register_heartbeat(
        &mut self,
        machine_id: &str,
        version: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        match self.machines.get_mut(machine_id) {
            Some(entry) => {
                let was_offline_since = entry.offline_since.take();
                let was_offline = entry.status == MachineStatus::Offline;

                entry.last_heartbeat = now;
                entry.missed_heartbeats = 0;
                entry.status = MachineStatus::Online;
                entry.metadata.last_updated = now;
                if let Some(version) = version {
                    entry.metadata.version = Some(version.to_string());
                }

                if was_offline {
                    tracing::info!(machine = %machine_id, "machine back online");
                    Some(Transition::BecameOnline {
                        machine_id: machine_id.to_string(),
                        at: now,
                        offline_since: was_offline_since,
                    })
                } else {
                    None
                }
            }
            None => {
                tracing::debug!(machine = %machine_id, "first heartbeat from machine");
                self.machines.insert(
                    machine_id.to_string(),
                    MachineHeartbeat {
                        machine_id: machine_id.to_string(),
                        last_heartbeat: now,
                        status: MachineStatus::Online,
                        missed_heartbeats: 0,
                        offline_since: None,
                        metadata: HeartbeatMetadata {
                            first_seen: now,
                            last_updated: now,
                            version: version.map(str::to_string),
                        },
                    },
                );
                None
            }
        }
    }

    /// Sweep every machine against the thresholds at `now`.
    ///
    /// Status only escalates here (`Online → Warning → Offline`); the only
    /// way back is a heartbeat. When a sweep finds a machine past both
    /// thresholds at once it still reports the warning crossing before the
    /// offline crossing. `offline_since` is set by the sweep that crosses the
    /// offline threshold and never re-set by later sweeps.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> Vec<Transition> {
        let mut transitions = Vec::new();
        self.last_check = Some(now);

        for entry in self.machines.values_mut() {
            let elapsed = now - entry.last_heartbeat;
            if elapsed < chrono::Duration::zero() {
                continue;
            }

            let interval_secs = self.config.interval.num_seconds().max(1);
            entry.missed_heartbeats = (elapsed.num_seconds() / interval_secs) as u32;
            entry.metadata.last_updated = now;

            let past_warning = elapsed >= self.config.warning_threshold;
            let past_offline = elapsed >= self.config.offline_threshold;

            match entry.status {
                MachineStatus::Online if past_warning => {
                    entry.status = MachineStatus::Warning;
                    transitions.push(Transition::BecameWarning {
                        machine_id: entry.machine_id.clone(),
                        at: now,
                    });
                    if past_offline {
                        entry.status = MachineStatus::Offline;
                        entry.offline_since = Some(now);
                        transitions.push(Transition::BecameOffline {
                            machine_id: entry.machine_id.clone(),
                            at: now,
                        });
                    }
                }
                MachineStatus::Warning if past_offline => {
                    entry.status = MachineStatus::Offline;
                    entry.offline_since = Some(now);
                    transitions.push(Transition::BecameOffline {
                        machine_id: entry.machine_id.clone(),
                        at: now,
                    });
                }
                _ => {}
            }
        }

        for transition in &transitions {
            if let Transition::BecameOffline { machine_id, .. } = transition {
                tracing::warn!(machine = %machine_id, "machine went offline");
            }
        }

        transitions
    }

    /// Entry for one machine, if it has ever been seen.
    pub fn get(&self, machine_id: &str) -> Option<&MachineHeartbeat> {
        self.machines.get(machine_id)
    }

    /// Machines currently classified `Offline`, sorted by id.
    pub fn offline_machines(&self) -> Vec<MachineHeartbeat> {
        self.filtered(MachineStatus::Offline)
    }

    /// Machines currently classified `Warning`, sorted by id.
    pub fn warning_machines(&self) -> Vec<MachineHeartbeat> {
        self.filtered(MachineStatus::Warning)
    }

    fn filtered(&self, status: MachineStatus) -> Vec<MachineHeartbeat> {
        let mut machines: Vec<_> = self
            .machines
            .values()
            .filter(|m| m.status == status)
            .cloned()
            .collect();
        machines.sort_by(|a, b| a.machine_id.cmp(&b.machine_id));
        machines
    }

    /// Full snapshot with aggregate counts.
    pub fn state(&self) -> RegistryState {
        let mut machines: Vec<_> = self.machines.values().cloned().collect();
        machines.sort_by(|a, b| a.machine_id.cmp(&b.machine_id));

        let count = |status| machines.iter().filter(|m| m.status == status).count();

        RegistryState {
            total_machines: machines.len(),
            online_count: count(MachineStatus::Online),
            warning_count: count(MachineStatus::Warning),
            offline_count: count(MachineStatus::Offline),
            last_heartbeat_check: self.last_check,
            machines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn registry() -> HeartbeatRegistry {
        // interval 10 s, warning at 30 s, offline at 60 s
        HeartbeatRegistry::new(HeartbeatConfig::from_secs(10, 30, 60))
    }

    #[test]
    fn test_first_heartbeat_creates_online_entry() {
        let mut reg = registry();
        let transition = reg.register_heartbeat("m1", Some("1.2.0"), t(0));
        assert!(transition.is_none());

        let entry = reg.get("m1").unwrap();
        assert_eq!(entry.status, MachineStatus::Online);
        assert_eq!(entry.missed_heartbeats, 0);
        assert_eq!(entry.metadata.first_seen, t(0));
        assert_eq!(entry.metadata.version.as_deref(), Some("1.2.0"));
    }

    #[test]
    fn test_sweep_escalates_to_warning() {
        let mut reg = registry();
        reg.register_heartbeat("m1", None, t(0));

        let transitions = reg.evaluate(t(35));
        assert_eq!(
            transitions,
            vec![Transition::BecameWarning {
                machine_id: "m1".into(),
                at: t(35)
            }]
        );
        assert_eq!(reg.get("m1").unwrap().status, MachineStatus::Warning);
        assert_eq!(reg.get("m1").unwrap().missed_heartbeats, 3);
    }

    #[test]
    fn test_sweep_escalates_to_offline_once() {
        let mut reg = registry();
        reg.register_heartbeat("m1", None, t(0));
        reg.evaluate(t(35));

        let transitions = reg.evaluate(t(65));
        assert_eq!(
            transitions,
            vec![Transition::BecameOffline {
                machine_id: "m1".into(),
                at: t(65)
            }]
        );
        assert_eq!(reg.get("m1").unwrap().offline_since, Some(t(65)));

        // A later sweep must not move offline_since or emit again.
        let transitions = reg.evaluate(t(120));
        assert!(transitions.is_empty());
        assert_eq!(reg.get("m1").unwrap().offline_since, Some(t(65)));
    }

    #[test]
    fn test_single_sweep_crossing_both_thresholds_passes_warning() {
        let mut reg = registry();
        reg.register_heartbeat("m1", None, t(0));

        let transitions = reg.evaluate(t(90));
        assert_eq!(
            transitions,
            vec![
                Transition::BecameWarning {
                    machine_id: "m1".into(),
                    at: t(90)
                },
                Transition::BecameOffline {
                    machine_id: "m1".into(),
                    at: t(90)
                },
            ]
        );
        assert_eq!(reg.get("m1").unwrap().status, MachineStatus::Offline);
    }

    #[test]
    fn test_heartbeat_resets_warning_machine() {
        let mut reg = registry();
        reg.register_heartbeat("m1", None, t(0));
        reg.evaluate(t(35));

        // Warning -> Online is silent; only offline episodes announce a return.
        let transition = reg.register_heartbeat("m1", None, t(40));
        assert!(transition.is_none());
        let entry = reg.get("m1").unwrap();
        assert_eq!(entry.status, MachineStatus::Online);
        assert_eq!(entry.missed_heartbeats, 0);
    }

    #[test]
    fn test_heartbeat_after_offline_fires_became_online_once() {
        let mut reg = registry();
        reg.register_heartbeat("m1", None, t(0));
        reg.evaluate(t(90));

        let transition = reg.register_heartbeat("m1", None, t(100));
        assert_eq!(
            transition,
            Some(Transition::BecameOnline {
                machine_id: "m1".into(),
                at: t(100),
                offline_since: Some(t(90)),
            })
        );
        assert_eq!(reg.get("m1").unwrap().offline_since, None);

        // The next heartbeat is an ordinary refresh.
        assert!(reg.register_heartbeat("m1", None, t(110)).is_none());
    }

    #[test]
    fn test_state_counts() {
        let mut reg = registry();
        reg.register_heartbeat("m1", None, t(0));
        reg.register_heartbeat("m2", None, t(50));
        reg.register_heartbeat("m3", None, t(85));
        reg.evaluate(t(90));

        let state = reg.state();
        assert_eq!(state.total_machines, 3);
        assert_eq!(state.offline_count, 1); // m1: 90 s silent
        assert_eq!(state.warning_count, 1); // m2: 40 s silent
        assert_eq!(state.online_count, 1); // m3: 5 s silent
        assert_eq!(state.last_heartbeat_check, Some(t(90)));
    }

    #[test]
    fn test_offline_and_warning_queries_sorted() {
        let mut reg = registry();
        reg.register_heartbeat("m2", None, t(0));
        reg.register_heartbeat("m1", None, t(0));
        reg.evaluate(t(90));

        let offline = reg.offline_machines();
        assert_eq!(offline.len(), 2);
        assert_eq!(offline[0].machine_id, "m1");
        assert_eq!(offline[1].machine_id, "m2");
        assert!(reg.warning_machines().is_empty());
    }

    #[test]
    fn test_entries_are_never_deleted() {
        let mut reg = registry();
        reg.register_heartbeat("m1", None, t(0));
        reg.evaluate(t(90));
        reg.evaluate(t(1_000_000));

        assert_eq!(reg.state().total_machines, 1);
        assert_eq!(reg.get("m1").unwrap().offline_since, Some(t(90)));
    }
}
