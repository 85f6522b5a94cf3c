//! Command Dispatcher - actuator commands with a short bounded retry.
//!
//! Runs independently of the sensor poller. Rejections (role, allow-list) are
//! returned to the caller; delivery outcomes only go to the audit log.

use crate::actuators::ActuatorMonitor;
use crate::audit::AuditLog;
use crate::config::DeviceConfig;
use crate::fetcher::Fetcher;
use farm_common::{AccessControl, ActuatorCommand, CommandError, Outcome, RetryPolicy};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of the delivery phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered { attempts: u32 },
    Failed { attempts: u32 },
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered { .. })
    }
}

pub struct CommandDispatcher {
    fetcher: Fetcher,
    device: DeviceConfig,
    policy: RetryPolicy,
    access: Arc<dyn AccessControl>,
    audit: Arc<dyn AuditLog>,
    actuators: Arc<ActuatorMonitor>,
}

impl CommandDispatcher {
    pub fn new(
        fetcher: Fetcher,
        device: DeviceConfig,
        policy: RetryPolicy,
        access: Arc<dyn AccessControl>,
        audit: Arc<dyn AuditLog>,
        actuators: Arc<ActuatorMonitor>,
    ) -> Self {
        Self {
            fetcher,
            device,
            policy,
            access,
            audit,
            actuators,
        }
    }

    /// Check the caller and the command name, then deliver.
    ///
    /// A delivery failure is not an error: it is recorded in the audit log
    /// and reported as `Delivery::Failed`.
    pub async fn send_command(&self, cmd: &str) -> Result<Delivery, CommandError> {
        let command = self.authorize(cmd)?;
        Ok(self.deliver(command).await)
    }

    /// Like [`send_command`](Self::send_command) but delivery runs in the
    /// background; only rejections are seen by the caller.
    pub fn spawn_command(self: &Arc<Self>, cmd: &str) -> Result<JoinHandle<Delivery>, CommandError> {
        let command = self.authorize(cmd)?;
        let dispatcher = Arc::clone(self);
        Ok(tokio::spawn(async move { dispatcher.deliver(command).await }))
    }

    /// Role gate first, allow-list second. Neither touches the network.
    pub fn authorize(&self, cmd: &str) -> Result<ActuatorCommand, CommandError> {
        let role = self.access.current_role();
        if !self.access.is_authenticated() {
            warn!("Rejected command {}: no authenticated session", cmd);
            return Err(CommandError::Unauthorized("anonymous".to_string()));
        }
        if !role.can_write() {
            warn!("Rejected command {}: role '{}' is read-only", cmd, role);
            return Err(CommandError::Unauthorized(role.to_string()));
        }

        cmd.parse::<ActuatorCommand>().map_err(|e| {
            warn!("Rejected command: {}", e);
            e
        })
    }

    async fn deliver(&self, command: ActuatorCommand) -> Delivery {
        let url = self.device.actuator_url(command.wire_name());
        let max_attempts = self.policy.max_attempts();

        for attempt in 1..=max_attempts {
            match self.fetcher.fetch_ok(&url, self.policy.attempt_timeout).await {
                Ok(()) => {
                    info!("{} delivered (attempt {}/{})", command, attempt, max_attempts);
                    self.audit.add_entry(command.label(), Outcome::Success).await;
                    self.actuators.spawn_refresh();
                    return Delivery::Delivered { attempts: attempt };
                }
                Err(e) => {
                    warn!(
                        "{} attempt {}/{} failed ({}): {}",
                        command,
                        attempt,
                        max_attempts,
                        e.as_str(),
                        e
                    );
                    if attempt < max_attempts {
                        let delay = self.policy.delay_for(attempt);
                        debug!("Retrying {} in {} ms", command, delay.as_millis());
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        self.audit.add_entry(command.label(), Outcome::Failure).await;
        Delivery::Failed {
            attempts: max_attempts,
        }
    }
}
