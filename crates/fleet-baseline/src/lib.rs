//! Versioned configuration baselines for fleet-sync
//!
//! The baseline is the canonical configuration snapshot of a machine, stored
//! at `sync-config.ref.json` in the shared root. History never lives as a
//! second active file: versions are immutable annotated tags
//! (`baseline-v<semver>`) whose message carries the serialized payload, plus
//! timestamped backup files written before any overwrite.

pub mod changelog;
pub mod error;
pub mod model;
pub mod store;

pub use error::{Error, Result};
pub use model::{Baseline, BaselineConfig};
pub use store::{BaselineStore, RestoreOptions, VersionOptions, VersionReceipt};
