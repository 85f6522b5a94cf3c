//! Device HTTP access with hard per-request deadlines.
//!
//! `Transport` is the seam between the poller/dispatcher and the network:
//! production code uses `HttpTransport` (reqwest), tests plug in scripted
//! fakes. The deadline is enforced here, above the transport, by dropping the
//! in-flight future when it expires.

use anyhow::{Context, Result};
use async_trait::async_trait;
use farm_common::FetchError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Connection setup limit for the HTTP client; the request deadline still
/// applies on top of it
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw GET against the device
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET and return the body of a 2xx response.
    ///
    /// Non-2xx responses map to `FetchError::HttpStatus`.
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            // The controller sits on the local network
            .no_proxy()
            .user_agent(concat!("farmd/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// Classify request error
    fn classify_error(err: &reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(0)
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus(status.as_u16())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::classify_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::classify_error(&e))?;
        Ok(body.to_vec())
    }
}

/// Deadline-enforcing front of a [`Transport`]
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetcher over a real HTTP client
    pub fn http() -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new()?)))
    }

    /// GET `url` and decode the body as JSON, failing after `deadline`.
    pub async fn fetch_json(
        &self,
        url: &str,
        deadline: Duration,
    ) -> Result<serde_json::Value, FetchError> {
        let body = self.fetch_body(url, deadline).await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// GET `url` where only the HTTP status matters.
    pub async fn fetch_ok(&self, url: &str, deadline: Duration) -> Result<(), FetchError> {
        self.fetch_body(url, deadline).await.map(|_| ())
    }

    async fn fetch_body(&self, url: &str, deadline: Duration) -> Result<Vec<u8>, FetchError> {
        debug!("GET {} (deadline {} ms)", url, deadline.as_millis());

        match timeout(deadline, self.transport.get(url)).await {
            Ok(Err(FetchError::Timeout(_))) | Err(_) => {
                Err(FetchError::Timeout(deadline.as_millis() as u64))
            }
            Ok(result) => result,
        }
    }
}
