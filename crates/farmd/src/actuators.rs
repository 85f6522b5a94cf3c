//! Actuator status monitor.
//!
//! Holds the last complete `/status` map. A refresh either replaces the map
//! wholesale or leaves it untouched.

use crate::fetcher::Fetcher;
use farm_common::{ActuatorKey, ActuatorStatus, DashboardEvent, FetchError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

pub struct ActuatorMonitor {
    fetcher: Fetcher,
    status_url: String,
    timeout: Duration,
    status: RwLock<ActuatorStatus>,
    events: broadcast::Sender<DashboardEvent>,
}

impl ActuatorMonitor {
    pub fn new(
        fetcher: Fetcher,
        status_url: String,
        timeout: Duration,
        events: broadcast::Sender<DashboardEvent>,
    ) -> Self {
        Self {
            fetcher,
            status_url,
            timeout,
            status: RwLock::new(ActuatorStatus::default()),
            events,
        }
    }

    /// Fetch `/status` and replace the map on success
    pub async fn refresh(&self) -> Result<ActuatorStatus, FetchError> {
        let body = self.fetcher.fetch_json(&self.status_url, self.timeout).await?;
        let fresh = ActuatorStatus::from_json(&body)?;

        *self.status.write().await = fresh.clone();
        debug!("Actuator status refreshed: {:?}", fresh);

        // No subscribers is fine
        let _ = self.events.send(DashboardEvent::ActuatorsUpdated {
            status: fresh.clone(),
        });
        Ok(fresh)
    }

    /// Refresh in the background; failures only show up in the log
    pub fn spawn_refresh(self: &Arc<Self>) {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = monitor.refresh().await {
                warn!("Actuator status refresh failed ({}): {}", e.as_str(), e);
            }
        });
    }

    /// Last complete map (empty until the first successful refresh)
    pub async fn status(&self) -> ActuatorStatus {
        self.status.read().await.clone()
    }

    /// Badge text per actuator, e.g. `(Led, "Ligado")`
    pub async fn labels(&self) -> Vec<(ActuatorKey, &'static str)> {
        self.status
            .read()
            .await
            .iter()
            .map(|(key, active)| (key, key.state_label(active)))
            .collect()
    }
}
