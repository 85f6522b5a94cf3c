//! Error types for the farm telemetry core.

use thiserror::Error;

/// Failure of a single device request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Device did not answer within {0} ms")]
    Timeout(u64),

    #[error("Device returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Malformed JSON body: {0}")]
    Decode(String),

    #[error("Unexpected payload: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Short machine-readable tag, used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::HttpStatus(_) => "http_status",
            FetchError::Decode(_) => "decode",
            FetchError::Validation(_) => "validation",
            FetchError::Transport(_) => "transport",
        }
    }
}

/// Synchronous rejection of an actuator command.
///
/// Delivery failures are not errors: they end up in the audit log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Command not allowed: {0}")]
    Rejected(String),

    #[error("Access denied: role '{0}' is read-only")]
    Unauthorized(String),
}
