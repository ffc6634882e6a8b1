//! Executor configuration: timeouts, retry and progress reporting.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Applied when a request gives no `timeoutSeconds`.
    pub default_timeout_seconds: u64,
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Minimum overall-progress delta between two progress events.
    pub progress_step_percent: u8,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout_seconds: 600,
            max_attempts: 3,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 30_000,
            progress_step_percent: 5,
        }
    }
}

impl ExecutorConfig {
    /// Backoff before `attempt` (1-based attempt that failed): base × 2^(attempt-1), capped.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = self
            .retry_base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.retry_max_delay_ms);
        Duration::from_millis(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let config = ExecutorConfig {
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 500,
            ..ExecutorConfig::default()
        };
        assert_eq!(config.retry_delay(1), Duration::from_millis(100));
        assert_eq!(config.retry_delay(2), Duration::from_millis(200));
        assert_eq!(config.retry_delay(3), Duration::from_millis(400));
        assert_eq!(config.retry_delay(4), Duration::from_millis(500));
        assert_eq!(config.retry_delay(60), Duration::from_millis(500));
    }
}
