//! Actuator commands and actuator status.

use crate::error::{CommandError, FetchError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Allow-listed actuator commands accepted by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActuatorCommand {
    LedOn,
    LedOff,
    FanOn,
    FanOff,
    Feed,
    Water,
}

impl ActuatorCommand {
    pub const ALL: [ActuatorCommand; 6] = [
        ActuatorCommand::LedOn,
        ActuatorCommand::LedOff,
        ActuatorCommand::FanOn,
        ActuatorCommand::FanOff,
        ActuatorCommand::Feed,
        ActuatorCommand::Water,
    ];

    /// Value of the `cmd` query parameter
    pub fn wire_name(&self) -> &'static str {
        match self {
            ActuatorCommand::LedOn => "LED_ON",
            ActuatorCommand::LedOff => "LED_OFF",
            ActuatorCommand::FanOn => "FAN_ON",
            ActuatorCommand::FanOff => "FAN_OFF",
            ActuatorCommand::Feed => "FEED",
            ActuatorCommand::Water => "WATER",
        }
    }

    /// Label written to the audit log
    pub fn label(&self) -> &'static str {
        match self {
            ActuatorCommand::LedOn => "Ligar LED",
            ActuatorCommand::LedOff => "Desligar LED",
            ActuatorCommand::FanOn => "Ligar Ventilador",
            ActuatorCommand::FanOff => "Desligar Ventilador",
            ActuatorCommand::Feed => "Alimentar",
            ActuatorCommand::Water => "Regar",
        }
    }

    /// Actuator affected by this command
    pub fn target(&self) -> ActuatorKey {
        match self {
            ActuatorCommand::LedOn | ActuatorCommand::LedOff => ActuatorKey::Led,
            ActuatorCommand::FanOn | ActuatorCommand::FanOff => ActuatorKey::Fan,
            ActuatorCommand::Feed => ActuatorKey::Feed,
            ActuatorCommand::Water => ActuatorKey::Water,
        }
    }

    /// True when `action` is the audit label of some command
    pub fn is_command_label(action: &str) -> bool {
        Self::ALL.iter().any(|c| c.label() == action)
    }
}

impl fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for ActuatorCommand {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.wire_name() == s)
            .ok_or_else(|| CommandError::Rejected(s.to_string()))
    }
}

/// Actuators reported by `GET /status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActuatorKey {
    Led,
    Fan,
    Feed,
    Water,
}

impl ActuatorKey {
    pub const ALL: [ActuatorKey; 4] = [
        ActuatorKey::Led,
        ActuatorKey::Fan,
        ActuatorKey::Feed,
        ActuatorKey::Water,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActuatorKey::Led => "LED",
            ActuatorKey::Fan => "FAN",
            ActuatorKey::Feed => "FEED",
            ActuatorKey::Water => "WATER",
        }
    }

    /// Status badge text for the given state
    pub fn state_label(&self, active: bool) -> &'static str {
        match (self, active) {
            (ActuatorKey::Led | ActuatorKey::Fan, true) => "Ligado",
            (ActuatorKey::Led | ActuatorKey::Fan, false) => "Desligado",
            (ActuatorKey::Feed, true) => "Alimentando",
            (ActuatorKey::Water, true) => "Regando",
            (ActuatorKey::Feed | ActuatorKey::Water, false) => "Parado",
        }
    }
}

impl fmt::Display for ActuatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete actuator map. Never partially updated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActuatorStatus {
    states: BTreeMap<ActuatorKey, bool>,
}

impl ActuatorStatus {
    /// Build from a `/status` body. All four actuators must be present as
    /// booleans, otherwise the whole payload is refused.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, FetchError> {
        let object = value
            .as_object()
            .ok_or_else(|| FetchError::Validation("status body is not an object".into()))?;

        let mut states = BTreeMap::new();
        for key in ActuatorKey::ALL {
            let active = object
                .get(key.as_str())
                .and_then(|v| v.as_bool())
                .ok_or_else(|| {
                    FetchError::Validation(format!("missing or non-boolean '{}'", key))
                })?;
            states.insert(key, active);
        }
        Ok(Self { states })
    }

    pub fn is_active(&self, key: ActuatorKey) -> Option<bool> {
        self.states.get(&key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActuatorKey, bool)> + '_ {
        self.states.iter().map(|(k, v)| (*k, *v))
    }
}
