//! Dashboard session - wires poller, dispatcher, monitor and audit trail
//! from one configuration.

use crate::actuators::ActuatorMonitor;
use crate::audit::{record_dashboard_access, AuditTrail};
use crate::config::Config;
use crate::dispatcher::CommandDispatcher;
use crate::fetcher::Fetcher;
use crate::poller::TelemetryPoller;
use crate::scheduler::PollScheduler;
use anyhow::Result;
use farm_common::{AccessControl, DashboardEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Buffered events per subscriber before it starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct Dashboard {
    pub poller: TelemetryPoller,
    pub dispatcher: Arc<CommandDispatcher>,
    pub audit: Arc<AuditTrail>,
    config: Config,
}

impl Dashboard {
    pub async fn build(
        config: Config,
        fetcher: Fetcher,
        access: Arc<dyn AccessControl>,
    ) -> Result<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let actuators = Arc::new(ActuatorMonitor::new(
            fetcher.clone(),
            config.device.status_url(),
            config.actuators.status_timeout(),
            events.clone(),
        ));

        let audit = Arc::new(match config.audit.persisted_path() {
            Some(path) => match AuditTrail::open(path, Arc::clone(&access)).await {
                Ok(trail) => trail,
                Err(e) => {
                    warn!("Audit trail kept in memory only: {:#}", e);
                    AuditTrail::in_memory(Arc::clone(&access))
                }
            },
            None => AuditTrail::in_memory(Arc::clone(&access)),
        });

        let poller = TelemetryPoller::new(
            fetcher.clone(),
            config.device.sensors_url(),
            config.polling.retry_policy(),
            config.polling.history_capacity,
            Arc::clone(&actuators),
            events,
        );

        let dispatcher = Arc::new(CommandDispatcher::new(
            fetcher,
            config.device.clone(),
            config.commands.retry_policy(),
            access,
            audit.clone(),
            actuators,
        ));

        Ok(Self {
            poller,
            dispatcher,
            audit,
            config,
        })
    }

    /// Record the session start and begin polling on the configured cadence
    pub async fn start(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        record_dashboard_access(self.audit.as_ref()).await;
        info!("Dashboard session started against {}", self.config.device.base_url);

        PollScheduler::new(self.poller.clone(), self.config.polling.interval()).spawn(shutdown)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.poller.subscribe()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
