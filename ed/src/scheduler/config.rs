//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coordinator loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between SCENARIO_START resends until the floors acknowledge
    #[serde(rename = "start-resend-ms", default = "default_start_resend_ms")]
    pub start_resend_ms: u64,
}

fn default_start_resend_ms() -> u64 {
    1000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            start_resend_ms: default_start_resend_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Get the handshake resend interval as a Duration
    pub fn start_resend(&self) -> Duration {
        Duration::from_millis(self.start_resend_ms)
    }
}
