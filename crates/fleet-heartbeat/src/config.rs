//! Liveness classification thresholds.

use chrono::Duration;

/// Thresholds controlling online/warning/offline classification.
///
/// No single authoritative interval exists across fleets — some share state
/// over a LAN mount, some over slow cloud sync — so all three values are
/// constructor parameters rather than constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Nominal spacing between heartbeats. `missed_heartbeats` is the number
    /// of whole intervals elapsed since the last heartbeat.
    pub interval: Duration,
    /// Elapsed time past which a machine is classified `Warning`.
    pub warning_threshold: Duration,
    /// Elapsed time past which a machine is classified `Offline`.
    pub offline_threshold: Duration,
}

impl Default for HeartbeatConfig {
    /// 60 s interval, warning after 120 s of silence, offline after 300 s.
    fn default() -> Self {
        Self {
            interval: Duration::seconds(60),
            warning_threshold: Duration::seconds(120),
            offline_threshold: Duration::seconds(300),
        }
    }
}

impl HeartbeatConfig {
    /// Convenience constructor from whole seconds.
    pub fn from_secs(interval: i64, warning: i64, offline: i64) -> Self {
        Self {
            interval: Duration::seconds(interval),
            warning_threshold: Duration::seconds(warning),
            offline_threshold: Duration::seconds(offline),
        }
    }
}
