use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Loop guard limits configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopLimits {
    /// Maximum time a single loop may run between resets, in milliseconds (default: 500ms)
    /// Measured on the wall clock, so time spent blocked inside the loop counts.
    pub threshold_ms: u64,
    /// Idle time after which `sweep()` evicts a counter entry (default: 60s, 0 = disabled)
    pub idle_ttl_ms: u64,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            threshold_ms: 500,   // 500ms per loop (anti-hang)
            idle_ttl_ms: 60_000, // 60s without a reset
        }
    }
}

impl LoopLimits {
    /// Builder: set the loop threshold
    pub fn with_threshold_ms(mut self, threshold_ms: u64) -> Self {
        self.threshold_ms = threshold_ms;
        self
    }

    /// Builder: set the idle TTL used by sweeps
    pub fn with_idle_ttl_ms(mut self, idle_ttl_ms: u64) -> Self {
        self.idle_ttl_ms = idle_ttl_ms;
        self
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms)
    }

    /// Idle TTL, `None` when sweeping is disabled
    pub fn idle_ttl(&self) -> Option<Duration> {
        (self.idle_ttl_ms > 0).then(|| Duration::from_millis(self.idle_ttl_ms))
    }
}
