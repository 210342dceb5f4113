//! Load/save cycle for the roadmap file.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::decision::Decision;
use crate::error::{Error, Result};
use crate::grammar::parse_roadmap;
use crate::writer::render_roadmap;

static DECISION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^DEC-(\d+)$").expect("Invalid decision id regex"));

/// The in-memory decision list.
#[derive(Debug, Clone, Default)]
pub struct Roadmap {
    pub decisions: Vec<Decision>,
}

impl Roadmap {
    pub fn find(&self, id: &str) -> Option<&Decision> {
        self.decisions.iter().find(|d| d.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Decision> {
        self.decisions.iter_mut().find(|d| d.id == id)
    }

    /// Replace the decision with the same id, or append it.
    pub fn upsert(&mut self, decision: Decision) {
        match self.find_mut(&decision.id) {
            Some(existing) => *existing = decision,
            None => self.decisions.push(decision),
        }
    }

    /// Allocate the next `DEC-###` id after the highest one present.
    pub fn next_id(&self) -> String {
        let max = self
            .decisions
            .iter()
            .filter_map(|d| DECISION_ID.captures(&d.id))
            .filter_map(|caps| caps.get(1).unwrap().as_str().parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("DEC-{:03}", max + 1)
    }
}

/// Reads and writes `sync-roadmap.md`.
///
/// Every mutation is a full parse → modify → re-render cycle through
/// [`Roadmap`]; the store never patches the file in place.
#[derive(Debug, Clone)]
pub struct RoadmapStore {
    path: PathBuf,
}

impl RoadmapStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load the roadmap. A missing file is an empty roadmap (first run).
    pub fn load(&self) -> Result<Roadmap> {
        if !self.path.exists() {
            return Ok(Roadmap::default());
        }
        let content = fleet_fs::read_text(&self.path)?;
        Ok(Roadmap {
            decisions: parse_roadmap(&content)?,
        })
    }

    /// Re-render and atomically write the whole roadmap.
    pub fn save(&self, roadmap: &Roadmap) -> Result<()> {
        fleet_fs::write_text(&self.path, &render_roadmap(&roadmap.decisions))?;
        Ok(())
    }

    /// Load one decision by id.
    pub fn get(&self, id: &str) -> Result<Decision> {
        self.load()?
            .find(id)
            .cloned()
            .ok_or_else(|| Error::DecisionNotFound { id: id.to_string() })
    }

    /// Load, upsert one decision, save.
    pub fn put(&self, decision: Decision) -> Result<()> {
        let mut roadmap = self.load()?;
        tracing::debug!(decision = %decision.id, status = decision.status.as_str(), "persisting decision");
        roadmap.upsert(decision);
        self.save(&roadmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{DecisionKind, DecisionStatus, Targets};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store() -> (TempDir, RoadmapStore) {
        let temp = TempDir::new().unwrap();
        let store = RoadmapStore::new(temp.path().join("sync-roadmap.md"));
        (temp, store)
    }

    fn decision(id: &str) -> Decision {
        Decision::new(
            id,
            "A change",
            DecisionKind::Config,
            "m1",
            Targets::All,
            Utc.with_ymd_and_hms(2026, 8, 6, 10, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let (_temp, store) = store();
        let roadmap = store.load().unwrap();
        assert!(roadmap.decisions.is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let (_temp, store) = store();
        store.put(decision("DEC-001")).unwrap();

        let loaded = store.get("DEC-001").unwrap();
        assert_eq!(loaded.id, "DEC-001");
        assert_eq!(loaded.status, DecisionStatus::Pending);
    }

    #[test]
    fn test_get_unknown_id() {
        let (_temp, store) = store();
        store.put(decision("DEC-001")).unwrap();
        assert!(matches!(
            store.get("DEC-999"),
            Err(Error::DecisionNotFound { .. })
        ));
    }

    #[test]
    fn test_put_updates_existing_block() {
        let (_temp, store) = store();
        store.put(decision("DEC-001")).unwrap();

        let mut updated = decision("DEC-001");
        updated.status = DecisionStatus::Approved;
        updated.approved_by = Some("m2".into());
        updated.approved_at = Some(Utc.with_ymd_and_hms(2026, 8, 6, 11, 0, 0).unwrap());
        store.put(updated.clone()).unwrap();

        let roadmap = store.load().unwrap();
        assert_eq!(roadmap.decisions.len(), 1);
        assert_eq!(roadmap.decisions[0], updated);
    }

    #[test]
    fn test_put_preserves_other_decisions() {
        let (_temp, store) = store();
        store.put(decision("DEC-001")).unwrap();
        store.put(decision("DEC-002")).unwrap();

        let mut updated = decision("DEC-001");
        updated.status = DecisionStatus::Rejected;
        store.put(updated).unwrap();

        let roadmap = store.load().unwrap();
        assert_eq!(roadmap.decisions.len(), 2);
        assert_eq!(roadmap.decisions[1].id, "DEC-002");
        assert_eq!(roadmap.decisions[1].status, DecisionStatus::Pending);
    }

    #[test]
    fn test_next_id() {
        let mut roadmap = Roadmap::default();
        assert_eq!(roadmap.next_id(), "DEC-001");

        roadmap.upsert(decision("DEC-001"));
        roadmap.upsert(decision("DEC-007"));
        assert_eq!(roadmap.next_id(), "DEC-008");

        // Foreign id formats are ignored for numbering.
        roadmap.upsert(decision("LEGACY-9"));
        assert_eq!(roadmap.next_id(), "DEC-008");
    }
}
