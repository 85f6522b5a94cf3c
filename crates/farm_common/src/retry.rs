//! Retry/backoff policy shared by sensor polling and command dispatch.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Growth factor applied per further retry (1.0 = fixed delay)
    pub backoff_multiplier: f64,
    /// Deadline of each individual attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Sensor polling: 3 retries, 1 s doubling, 1.5 s deadline
    pub fn sensor_polling() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_millis(1500),
        }
    }

    /// Command dispatch: one retry after a fixed 500 ms, 800 ms deadline
    pub fn command_dispatch() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(500),
            backoff_multiplier: 1.0,
            attempt_timeout: Duration::from_millis(800),
        }
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based): base * multiplier^(retry-1)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.max(0.0).powi(exponent);
        let ms = (self.base_delay.as_millis() as f64 * factor).round();
        if ms.is_finite() && ms < u64::MAX as f64 {
            Duration::from_millis(ms as u64)
        } else {
            Duration::from_millis(u64::MAX)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::sensor_polling()
    }
}
