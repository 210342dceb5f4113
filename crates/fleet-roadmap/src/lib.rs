//! Decision model and roadmap store for fleet-sync
//!
//! Configuration-change proposals ("decisions") are reviewed and applied
//! across the fleet. Their durable form is `sync-roadmap.md` in the shared
//! root: a Markdown file of delimited blocks that stays readable to humans
//! while remaining a strict serialization format for machines.
//!
//! The file is a *view* over the in-memory decision list. Mutation is always
//! parse → modify the model → re-render the whole file; nothing ever patches
//! substrings in place.

pub mod decision;
pub mod error;
pub mod grammar;
pub mod store;
pub mod writer;

pub use decision::{
    AppliedChanges, Decision, DecisionKind, DecisionStatus, Targets,
};
pub use error::{Error, Result};
pub use grammar::{parse_decision_block, parse_roadmap};
pub use store::{Roadmap, RoadmapStore};
pub use writer::{render_decision_block, render_roadmap};
