//! Machine liveness registry for fleet-sync
//!
//! Tracks when each machine in the fleet last proved it was alive and
//! classifies every machine as online, warning, or offline against
//! configurable thresholds. The registry is deliberately pure in-memory
//! state: it performs no I/O and takes the current time as a parameter, so
//! the whole classification state machine is unit-testable. Persistence of
//! heartbeat proof files is layered on by the engine.

pub mod config;
pub mod registry;

pub use config::HeartbeatConfig;
pub use registry::{
    HeartbeatMetadata, HeartbeatRegistry, MachineHeartbeat, MachineStatus, RegistryState,
    Transition,
};
