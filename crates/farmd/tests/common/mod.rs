//! Scripted fake device shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use farm_common::{AccessControl, FetchError, Role, Session};
use farmd::config::{AuditConfig, Config};
use farmd::{Dashboard, Fetcher, Transport};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const GOOD_READING: &str =
    r#"{"temperature":25,"humidity":60,"steam":10,"light":2048,"soil":40,"water":80}"#;

pub const ALL_OFF: &str = r#"{"LED":false,"FAN":false,"FEED":false,"WATER":false}"#;

pub const FAN_RUNNING: &str = r#"{"LED":false,"FAN":true,"FEED":false,"WATER":false}"#;

/// One scripted answer
pub enum Step {
    Body(&'static str),
    Status(u16),
    /// Never answers; the fetch deadline has to cut it off
    Hang,
    /// Answers with the body once the gate is opened
    Gated(Arc<Notify>, &'static str),
}

/// Device whose answers are queued per endpoint. Unscripted requests fail
/// with a transport error.
#[derive(Default)]
pub struct ScriptedDevice {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue an answer for `endpoint` ("sensors", "status" or "actuator")
    pub fn push(&self, endpoint: &str, step: Step) {
        self.scripts
            .lock()
            .unwrap()
            .entry(endpoint.to_string())
            .or_default()
            .push_back(step);
    }

    /// Requests seen so far for `endpoint`
    pub fn hits(&self, endpoint: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|url| endpoint_of(url) == endpoint)
            .count()
    }

    pub fn total_hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn endpoint_of(url: &str) -> &str {
    let last = url.rsplit('/').next().unwrap_or("");
    last.split('?').next().unwrap_or("")
}

#[async_trait]
impl Transport for ScriptedDevice {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(endpoint_of(url))
            .and_then(|q| q.pop_front());

        match step {
            Some(Step::Body(body)) => Ok(body.as_bytes().to_vec()),
            Some(Step::Status(code)) => Err(FetchError::HttpStatus(code)),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(FetchError::Transport("hang ended".into()))
            }
            Some(Step::Gated(gate, body)) => {
                gate.notified().await;
                Ok(body.as_bytes().to_vec())
            }
            None => Err(FetchError::Transport("connection refused".into())),
        }
    }
}

/// Config with short deadlines and delays so backoff runs in milliseconds
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.device.base_url = "http://device.test".to_string();
    config.polling.sensor_timeout_ms = 40;
    config.polling.base_delay_ms = 10;
    config.polling.max_retries = 3;
    config.polling.history_capacity = 60;
    config.actuators.status_timeout_ms = 40;
    config.commands.timeout_ms = 40;
    config.commands.retry_delay_ms = 10;
    config.commands.max_attempts = 2;
    config.audit = AuditConfig::in_memory();
    config
}

pub fn student() -> Arc<dyn AccessControl> {
    Arc::new(Session::new("joana", Role::Aluno))
}

pub fn professor() -> Arc<dyn AccessControl> {
    Arc::new(Session::new("maria", Role::Professor))
}

pub async fn dashboard(
    device: &Arc<ScriptedDevice>,
    config: Config,
    access: Arc<dyn AccessControl>,
) -> Dashboard {
    let transport: Arc<dyn Transport> = device.clone();
    Dashboard::build(config, Fetcher::new(transport), access)
        .await
        .unwrap()
}
