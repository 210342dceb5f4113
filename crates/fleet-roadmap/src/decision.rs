//! The decision data model and its legal status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of change a decision proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    /// Merge a JSON payload into the baseline configuration.
    Config,
    /// Replace the content of one file under the shared root.
    File,
    /// Set one dotted key inside the baseline configuration.
    Setting,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::File => "file",
            Self::Setting => "setting",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "config" => Some(Self::Config),
            "file" => Some(Self::File),
            "setting" => Some(Self::Setting),
            _ => None,
        }
    }
}

/// Lifecycle state of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
    Failed,
    RolledBack,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Applied => "applied",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "applied" => Some(Self::Applied),
            "failed" => Some(Self::Failed),
            "rolled_back" => Some(Self::RolledBack),
            _ => None,
        }
    }

    /// Whether the lifecycle permits moving from `self` to `to`.
    ///
    /// `Failed → Pending` is the automatic-rollback retry path: a failed
    /// apply whose restore succeeded goes back to the review queue.
    pub fn may_transition_to(self, to: DecisionStatus) -> bool {
        use DecisionStatus::*;
        matches!(
            (self, to),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Applied)
                | (Approved, Failed)
                | (Failed, Pending)
                | (Applied, RolledBack)
        )
    }
}

/// Which machines a decision targets.
///
/// Serializes as the sentinel string `"all"` or an explicit machine list,
/// matching the tool-facing contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// The sentinel `all`.
    All,
    /// An explicit machine list.
    Machines(Vec<String>),
}

impl Serialize for Targets {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("all"),
            Self::Machines(machines) => machines.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Targets {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::One(s) if s == "all" => Targets::All,
            Raw::One(s) => Targets::Machines(vec![s]),
            Raw::Many(machines) => Targets::Machines(machines),
        })
    }
}

impl Targets {
    pub fn includes(&self, machine_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Machines(machines) => machines.iter().any(|m| m == machine_id),
        }
    }

    /// Render as the roadmap field value: `all` or a comma-separated list.
    pub fn render(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Machines(machines) => machines.join(", "),
        }
    }

    /// Parse the roadmap field value.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s == "all" {
            Self::All
        } else {
            Self::Machines(
                s.split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect(),
            )
        }
    }
}

/// Files touched by a real apply, by category of change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedChanges {
    pub files_modified: Vec<String>,
    pub files_created: Vec<String>,
    pub files_deleted: Vec<String>,
}

impl AppliedChanges {
    pub fn total(&self) -> usize {
        self.files_modified.len() + self.files_created.len() + self.files_deleted.len()
    }
}

/// A proposed configuration change.
///
/// Decisions are never physically deleted: they either reach a terminal
/// state (`Rejected`, `RolledBack`) or stay `Applied` in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub title: String,
    pub kind: DecisionKind,
    /// Target path: a file path for `File`, a dotted config key for
    /// `Setting`, unused for `Config`.
    pub path: Option<String>,
    pub source_machine: String,
    pub targets: Targets,
    pub status: DecisionStatus,

    pub created_at: DateTime<Utc>,
    pub created_by: String,

    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,

    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<String>,
    pub reject_reason: Option<String>,

    pub applied_at: Option<DateTime<Utc>>,
    pub applied_by: Option<String>,
    pub changes: Option<AppliedChanges>,

    pub rolled_back_at: Option<DateTime<Utc>>,
    pub rolled_back_by: Option<String>,
    pub rollback_reason: Option<String>,

    pub description: Option<String>,
    /// Change payload: JSON for `Config`/`Setting`, full file content for
    /// `File`. Multi-line.
    pub diff: Option<String>,
}

impl Decision {
    /// A fresh `Pending` decision.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        kind: DecisionKind,
        source_machine: impl Into<String>,
        targets: Targets,
        created_at: DateTime<Utc>,
    ) -> Self {
        let source_machine = source_machine.into();
        Self {
            id: id.into(),
            title: title.into(),
            kind,
            path: None,
            created_by: source_machine.clone(),
            source_machine,
            targets,
            status: DecisionStatus::Pending,
            created_at,
            approved_at: None,
            approved_by: None,
            rejected_at: None,
            rejected_by: None,
            reject_reason: None,
            applied_at: None,
            applied_by: None,
            changes: None,
            rolled_back_at: None,
            rolled_back_by: None,
            rollback_reason: None,
            description: None,
            diff: None,
        }
    }
}
