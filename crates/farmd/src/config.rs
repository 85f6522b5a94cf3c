//! Configuration management for farmd.
//!
//! Loads settings from /etc/farmd/config.toml or uses defaults.

use anyhow::{Context, Result};
use farm_common::{RetryPolicy, Role, Session};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/farmd/config.toml";

/// Default config file path for fallback
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/farmd/config.toml";

/// Audit trail file shared by `run`, `send` and `logs`
pub const DEFAULT_AUDIT_PATH: &str = "/var/lib/farmd/audit.json";

/// Device endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Base URL of the controller, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://10.106.33.1".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl DeviceConfig {
    pub fn sensors_url(&self) -> String {
        format!("{}/sensors", self.base_url.trim_end_matches('/'))
    }

    pub fn status_url(&self) -> String {
        format!("{}/status", self.base_url.trim_end_matches('/'))
    }

    pub fn actuator_url(&self, cmd: &str) -> String {
        format!("{}/actuator?cmd={}", self.base_url.trim_end_matches('/'), cmd)
    }
}

/// Sensor polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// External tick cadence in milliseconds
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,

    /// Deadline of one `/sensors` request
    #[serde(default = "default_sensor_timeout")]
    pub sensor_timeout_ms: u64,

    /// Self-scheduled retries before giving up until the next tick
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Samples kept for the chart
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_poll_interval() -> u64 {
    2_000
}

fn default_sensor_timeout() -> u64 {
    1_500
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_history_capacity() -> usize {
    farm_common::history::DEFAULT_HISTORY_CAPACITY
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
            sensor_timeout_ms: default_sensor_timeout(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            attempt_timeout: Duration::from_millis(self.sensor_timeout_ms),
        }
    }
}

/// Actuator status refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorConfig {
    #[serde(default = "default_short_timeout")]
    pub status_timeout_ms: u64,
}

fn default_short_timeout() -> u64 {
    800
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            status_timeout_ms: default_short_timeout(),
        }
    }
}

impl ActuatorConfig {
    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }
}

/// Command dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Deadline of each delivery attempt
    #[serde(default = "default_short_timeout")]
    pub timeout_ms: u64,

    /// Total delivery attempts
    #[serde(default = "default_command_attempts")]
    pub max_attempts: u32,

    /// Fixed pause between attempts
    #[serde(default = "default_command_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_command_attempts() -> u32 {
    2
}

fn default_command_retry_delay() -> u64 {
    500
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_short_timeout(),
            max_attempts: default_command_attempts(),
            retry_delay_ms: default_command_retry_delay(),
        }
    }
}

impl CommandConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_attempts.saturating_sub(1),
            base_delay: Duration::from_millis(self.retry_delay_ms),
            backoff_multiplier: 1.0,
            attempt_timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Mirror the trail to `path`; in-memory only when false
    #[serde(default = "default_audit_persist")]
    pub persist: bool,

    /// JSON file the trail is persisted to
    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
}

fn default_audit_persist() -> bool {
    true
}

fn default_audit_path() -> PathBuf {
    PathBuf::from(DEFAULT_AUDIT_PATH)
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            persist: default_audit_persist(),
            path: default_audit_path(),
        }
    }
}

impl AuditConfig {
    /// Backing file, if persistence is enabled
    pub fn persisted_path(&self) -> Option<&Path> {
        self.persist.then_some(self.path.as_path())
    }

    /// Keep the trail in memory only
    pub fn in_memory() -> Self {
        Self {
            persist: false,
            ..Self::default()
        }
    }
}

/// Session used by the CLI when sending commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_role")]
    pub role: String,
}

fn default_username() -> String {
    "aluno".to_string()
}

fn default_role() -> String {
    "aluno".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            role: default_role(),
        }
    }
}

impl SessionConfig {
    pub fn to_session(&self) -> Session {
        Session::new(&self.username, Role::from(self.role.as_str()))
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub actuators: ActuatorConfig,

    #[serde(default)]
    pub commands: CommandConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Load config from file, or return defaults
    pub fn load() -> Self {
        Self::load_from_path(Path::new(CONFIG_PATH))
            .or_else(|_| Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH)))
            .unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {}", e);
                Config::default()
            })
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save default config to path (for init)
    pub fn save_default(path: &Path) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        info!("Saved default config to {}", path.display());
        Ok(())
    }
}
