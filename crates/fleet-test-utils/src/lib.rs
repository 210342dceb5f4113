//! Shared test fixtures for the fleet-sync workspace.
//!
//! Dev-dependency only, never published. Provides a ready-made engine over a
//! temporary shared root with a scripted command runner, plus one-shot
//! tracing initialization for tests.

pub mod logging;
pub mod state;

pub use state::TestState;
