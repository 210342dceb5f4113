//! Synchronization engine for fleet-sync
//!
//! This crate wires the layer-0 crates into the fleet synchronization core:
//!
//! - **SyncEngine**: the context object constructed once at process start
//!   and injected into every handler (no global singleton)
//! - **DecisionEngine**: the decision lifecycle state machine with
//!   per-decision apply/rollback serialization
//! - **SyncEventCoordinator**: backup-then-sync reactions to machines going
//!   offline or returning
//! - **SyncConfig**: tunables with documented defaults, loadable from
//!   `sync.toml`
//!
//! # Architecture
//!
//! ```text
//!                tool / CLI layer
//!                       |
//!                  fleet-core
//!                       |
//!     +--------+--------+---------+----------+
//!     |        |        |         |          |
//! fleet-fs fleet-runner fleet-heartbeat fleet-roadmap
//!              fleet-baseline  fleet-rollback
//! ```

pub mod config;
pub mod coordinator;
pub mod decision_engine;
pub mod engine;
pub mod error;
mod json;

pub use config::{HeartbeatSettings, SyncConfig};
pub use coordinator::{
    OfflineSyncOptions, OnlineSyncOptions, SyncChanges, SyncEventCoordinator, SyncEventResult,
};
pub use decision_engine::{
    ApplyOptions, ApplyResult, BaselineFreshnessChecker, ConflictChecker, DecisionEngine,
    NewDecision, RollbackOutcome,
};
pub use engine::SyncEngine;
pub use error::{Error, Result};
