//! Device reachability and the backoff state machine.
//!
//! ```text
//! Healthy     --failure--> Retrying(1)      backoff = base
//! Retrying(n) --failure--> Retrying(n+1)    backoff doubled, n < max
//! Retrying(n) --failure--> Failed           n == max
//! any         --success--> Healthy          backoff = base, count = 0
//! Failed      --failure--> Retrying(1)      next external tick starts over
//! ```

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Phase of the link to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "attempt", rename_all = "camelCase")]
pub enum LinkPhase {
    Healthy,
    Retrying(u32),
    Failed,
}

impl fmt::Display for LinkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkPhase::Healthy => write!(f, "healthy"),
            LinkPhase::Retrying(n) => write!(f, "retrying({})", n),
            LinkPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Reachability tracker owned by the poller.
///
/// Starts `Healthy` with no retries pending, but reports disconnected until
/// the device has answered once.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    phase: LinkPhase,
    backoff_delay: Duration,
    policy: RetryPolicy,
    established: bool,
}

impl ConnectionState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            phase: LinkPhase::Healthy,
            backoff_delay: policy.base_delay,
            policy,
            established: false,
        }
    }

    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    pub fn connected(&self) -> bool {
        self.established && self.phase == LinkPhase::Healthy
    }

    /// True once any fetch has succeeded
    pub fn established(&self) -> bool {
        self.established
    }

    pub fn retry_count(&self) -> u32 {
        match self.phase {
            LinkPhase::Healthy => 0,
            LinkPhase::Retrying(n) => n,
            LinkPhase::Failed => self.policy.max_retries,
        }
    }

    pub fn backoff_delay(&self) -> Duration {
        self.backoff_delay
    }

    pub fn max_retries(&self) -> u32 {
        self.policy.max_retries
    }

    pub fn record_success(&mut self) -> LinkPhase {
        self.established = true;
        self.phase = LinkPhase::Healthy;
        self.backoff_delay = self.policy.base_delay;
        self.phase
    }

    pub fn record_failure(&mut self) -> LinkPhase {
        let next_retry = match self.phase {
            LinkPhase::Healthy | LinkPhase::Failed => 1,
            LinkPhase::Retrying(n) => n + 1,
        };

        if next_retry > self.policy.max_retries {
            self.phase = LinkPhase::Failed;
        } else {
            self.phase = LinkPhase::Retrying(next_retry);
            self.backoff_delay = self.policy.delay_for(next_retry);
        }
        self.phase
    }

    /// Delay before the self-scheduled retry, if one is due
    pub fn pending_retry(&self) -> Option<Duration> {
        match self.phase {
            LinkPhase::Retrying(_) => Some(self.backoff_delay),
            _ => None,
        }
    }

    /// Human-readable status line for the presentation layer
    pub fn advisory_message(&self) -> String {
        match self.phase {
            LinkPhase::Healthy if !self.established => "Waiting for device".to_string(),
            LinkPhase::Healthy => "Connected to device".to_string(),
            LinkPhase::Retrying(n) => format!(
                "Connection lost, retrying ({}/{}) in {} ms",
                n,
                self.policy.max_retries,
                self.backoff_delay.as_millis()
            ),
            LinkPhase::Failed => format!(
                "Device unreachable after {} retries, waiting for next poll",
                self.policy.max_retries
            ),
        }
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            connected: self.connected(),
            phase: self.phase,
            retry_count: self.retry_count(),
            backoff_delay_ms: self.backoff_delay.as_millis() as u64,
        }
    }
}

/// Read-only view handed to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    pub connected: bool,
    pub phase: LinkPhase,
    pub retry_count: u32,
    pub backoff_delay_ms: u64,
}
