//! Per-decision rollback points for fleet-sync
//!
//! Immediately before a decision mutates any file, the engine captures a
//! rollback point: a bundle under `.rollback/<decision-id>/` holding a copy
//! of every file about to be touched plus a manifest. Bundle creation is
//! all-or-nothing (staged, then renamed into place), and bundles are kept
//! after use for audit and rollback-of-rollback.

pub mod error;
pub mod manager;

pub use error::{Error, Result};
pub use manager::{BackedUpFile, RestoreReport, RollbackManager, RollbackManifest, RollbackPoint};
