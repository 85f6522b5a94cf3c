//! Audit log records and filters.

use crate::command::ActuatorCommand;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum entries kept by the audit log
pub const AUDIT_CAPACITY: usize = 100;

/// Actor recorded when no session user is known
pub const UNKNOWN_ACTOR: &str = "desconhecido";

/// Label recorded when a dashboard session starts
pub const DASHBOARD_ACCESS_ACTION: &str = "Acesso ao Dashboard";

/// Outcome column of the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "Sucesso")]
    Success,
    #[serde(rename = "Falha")]
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "Sucesso",
            Outcome::Failure => "Falha",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit entry for a user-visible action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub outcome: Outcome,
}

impl AuditEntry {
    pub fn new(actor: &str, action: &str, outcome: Outcome) -> Self {
        let actor = if actor.trim().is_empty() {
            UNKNOWN_ACTOR
        } else {
            actor
        };
        Self {
            timestamp: Utc::now(),
            actor: actor.to_string(),
            action: action.to_string(),
            outcome,
        }
    }

    /// Local wall-clock time as `YYYY-MM-DD HH:MM:SS`
    pub fn display_timestamp(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

/// Row filter for the audit view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFilter {
    #[default]
    All,
    /// Only actuator commands
    Commands,
    /// Only failed actions
    Errors,
}

impl LogFilter {
    /// Check an entry against this filter and an optional `YYYY-MM-DD` date
    pub fn matches(&self, entry: &AuditEntry, date: Option<&str>) -> bool {
        let kind_ok = match self {
            LogFilter::All => true,
            LogFilter::Commands => ActuatorCommand::is_command_label(&entry.action),
            LogFilter::Errors => entry.outcome == Outcome::Failure,
        };

        let date_ok = match date {
            Some(day) if !day.is_empty() => entry.display_timestamp().starts_with(day),
            _ => true,
        };

        kind_ok && date_ok
    }
}

impl FromStr for LogFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(LogFilter::All),
            "commands" => Ok(LogFilter::Commands),
            "errors" => Ok(LogFilter::Errors),
            other => Err(format!("unknown log filter: {}", other)),
        }
    }
}
