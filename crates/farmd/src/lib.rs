//! farmd - Smart Farm telemetry poller and actuator control.
//!
//! Polls the greenhouse controller for sensor readings, keeps a bounded
//! history, tracks reachability with backoff, and dispatches actuator
//! commands with an audit trail.

pub mod actuators;
pub mod audit;
pub mod config;
pub mod dashboard;
pub mod dispatcher;
pub mod fetcher;
pub mod poller;
pub mod render;
pub mod scheduler;

pub use actuators::ActuatorMonitor;
pub use audit::{AuditLog, AuditTrail};
pub use config::Config;
pub use dashboard::Dashboard;
pub use dispatcher::{CommandDispatcher, Delivery};
pub use fetcher::{Fetcher, HttpTransport, Transport};
pub use poller::{PollOutcome, TelemetryPoller};
pub use scheduler::PollScheduler;
