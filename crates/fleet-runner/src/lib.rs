//! External command execution seam for fleet-sync
//!
//! The synchronization core shells out for exactly one class of work: version
//! control operations on the shared root. Everything goes through the
//! [`CommandRunner`] trait so the core never binds to a specific subprocess
//! API and tests inject a [`fake::FakeRunner`] instead of a real `git`.
//!
//! Timeouts are a first-class, retryable failure ([`Error::Timeout`]),
//! deliberately distinct from a missing executable ([`Error::NotFound`]).

pub mod error;
pub mod fake;
pub mod runner;

pub use error::{Error, Result};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner, RunOptions};
