//! Session lifecycle monitoring.
//!
//! `SessionMonitor` is the state machine (logged out, stable, warning,
//! expired). `MonitorHandle` runs it on a tokio task with two recurring
//! checks: a coarse liveness poll that re-reads the token store, and a fine
//! countdown tick that watches the cached access expiry. Dropping the handle
//! cancels both.

pub mod driver;
pub mod machine;
pub mod state;

use std::time::Duration;

pub use driver::MonitorHandle;
pub use machine::SessionMonitor;
pub use state::{
    LogoutReason, SessionError, SessionEvent, SessionSnapshot, SessionState, SessionView,
};

/// Seconds between liveness polls
pub const DEFAULT_LIVENESS_INTERVAL_SECS: u64 = 60;

/// Milliseconds between countdown ticks
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Remaining lifetime at which the user is warned
pub const DEFAULT_WARNING_THRESHOLD_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub liveness_interval: Duration,
    pub tick_interval: Duration,
    pub warning_threshold: Duration,
}

impl MonitorConfig {
    pub fn warning_threshold_millis(&self) -> i64 {
        self.warning_threshold.as_millis() as i64
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            liveness_interval: Duration::from_secs(DEFAULT_LIVENESS_INTERVAL_SECS),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            warning_threshold: Duration::from_secs(DEFAULT_WARNING_THRESHOLD_SECS),
        }
    }
}
