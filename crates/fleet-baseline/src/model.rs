//! The baseline data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The four configuration sections of a baseline. Their contents are
/// free-form JSON owned by the tools that write them; the store only
/// guarantees all four sections are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    pub roo: serde_json::Value,
    pub hardware: serde_json::Value,
    pub software: serde_json::Value,
    pub system: serde_json::Value,
}

impl BaselineConfig {
    /// An empty configuration with all sections present.
    pub fn empty() -> Self {
        Self {
            roo: serde_json::json!({}),
            hardware: serde_json::json!({}),
            software: serde_json::json!({}),
            system: serde_json::json!({}),
        }
    }
}

/// The canonical configuration snapshot of one machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub machine_id: String,
    /// Semver string, advanced by `BaselineStore::version`.
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub config: BaselineConfig,
}

impl Baseline {
    pub fn new(machine_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
            version: version.into(),
            last_updated: Utc::now(),
            config: BaselineConfig::empty(),
        }
    }

    /// Parse a serialized payload, verifying the structure. Restored
    /// payloads come from tags and backup files written by other machines,
    /// so a missing section must fail here rather than corrupt the active
    /// baseline.
    pub fn from_payload(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| Error::InvalidPayload {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_payload_round_trip() {
        let baseline = Baseline::new("m1", "1.0.0");
        let payload = serde_json::to_string_pretty(&baseline).unwrap();
        let parsed = Baseline::from_payload(&payload).unwrap();
        assert_eq!(parsed, baseline);
    }

    #[test]
    fn test_from_payload_missing_section() {
        let payload = r#"{
            "machine_id": "m1",
            "version": "1.0.0",
            "last_updated": "2026-08-06T10:00:00Z",
            "config": { "roo": {}, "hardware": {}, "software": {} }
        }"#;
        let err = Baseline::from_payload(payload).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload { .. }));
        assert!(err.to_string().contains("system"));
    }

    #[test]
    fn test_from_payload_not_json() {
        assert!(matches!(
            Baseline::from_payload("not json"),
            Err(Error::InvalidPayload { .. })
        ));
    }
}
