//! Events published to presentation subscribers.

use crate::command::ActuatorStatus;
use crate::connection::ConnectionSnapshot;
use crate::sample::SensorSample;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DashboardEvent {
    /// First poll of a session is under way, nothing to show yet
    Loading,
    /// A new sample was admitted to history
    #[serde(rename_all = "camelCase")]
    DataUpdated {
        sample: SensorSample,
        history: Vec<SensorSample>,
        connection: ConnectionSnapshot,
    },
    /// A poll failed; the connection snapshot says what happens next
    Error {
        message: String,
        connection: ConnectionSnapshot,
    },
    /// Fresh actuator map from `/status`
    ActuatorsUpdated { status: ActuatorStatus },
}

impl DashboardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DashboardEvent::Loading => "loading",
            DashboardEvent::DataUpdated { .. } => "dataUpdated",
            DashboardEvent::Error { .. } => "error",
            DashboardEvent::ActuatorsUpdated { .. } => "actuatorsUpdated",
        }
    }
}
