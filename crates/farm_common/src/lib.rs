//! Shared types for the Smart Farm telemetry daemon.
//!
//! Everything here is pure: no I/O, no runtime.

pub mod access;
pub mod audit;
pub mod chart;
pub mod command;
pub mod connection;
pub mod error;
pub mod events;
pub mod history;
pub mod retry;
pub mod sample;

pub use access::{AccessControl, Role, Session};
pub use audit::{AuditEntry, LogFilter, Outcome};
pub use command::{ActuatorCommand, ActuatorKey, ActuatorStatus};
pub use connection::{ConnectionSnapshot, ConnectionState, LinkPhase};
pub use error::{CommandError, FetchError};
pub use events::DashboardEvent;
pub use history::BoundedHistory;
pub use retry::RetryPolicy;
pub use sample::{normalize_light, RawReading, SampleField, SensorSample};

/// Crate version for status output
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
