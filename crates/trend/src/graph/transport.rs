//! HTTP transport seam
//!
//! The harvester only ever needs an authenticated GET returning a status
//! and a body. The production implementation uses a blocking ureq agent
//! driven from tokio's blocking pool so the rest of the pipeline stays
//! async.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::TransportError;

/// Largest response body read into memory
const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 with a JSON body
    pub fn ok(body: &serde_json::Value) -> Self {
        Self::new(200, body.to_string())
    }
}

/// Authenticated HTTP GET
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET `url` with `Authorization: Bearer {bearer}`
    ///
    /// Any HTTP status is a successful exchange; only failures to obtain a
    /// response are errors.
    async fn get(&self, url: &str, bearer: &str) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by a ureq agent
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Create a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self { agent }
    }

    fn get_blocking(
        agent: &ureq::Agent,
        url: &str,
        bearer: &str,
    ) -> Result<HttpResponse, TransportError> {
        let mut response = agent
            .get(url)
            .header("Authorization", &format!("Bearer {}", bearer))
            .header("Accept", "application/json")
            .call()
            .map_err(|e| TransportError::new(format!("GET {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_string()
            .map_err(|e| TransportError::new(format!("Failed to read response body: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpTransport for UreqTransport {
    async fn get(&self, url: &str, bearer: &str) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        let url = url.to_string();
        let bearer = bearer.to_string();

        tokio::task::spawn_blocking(move || Self::get_blocking(&agent, &url, &bearer))
            .await
            .map_err(|e| TransportError::new(format!("HTTP worker failed: {}", e)))?
    }
}

type Handler = dyn Fn(&str) -> Result<HttpResponse, TransportError> + Send + Sync;

/// Transport answering every GET from a closure
///
/// Records each requested URL. Used to drive the pipeline offline.
pub struct FnTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<String>>,
}

impl FnTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every URL requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of requested URLs containing `pattern`
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.requests()
            .iter()
            .filter(|url| url.contains(pattern))
            .count()
    }
}

#[async_trait]
impl HttpTransport for FnTransport {
    async fn get(&self, url: &str, _bearer: &str) -> Result<HttpResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        (self.handler)(url)
    }
}
