//! Configuration loading for the harvester
//!
//! Supports loading Graph app credentials from (in order of priority):
//! 1. Compile-time embedded credentials (for production builds)
//! 2. JSON file in the mail-trend config directory
//! 3. Runtime environment variables (fallback)
//!
//! Harvest tuning lives in an optional `settings.json` next to the
//! credentials; every field has a default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::RetryPolicy;
use crate::graph::DEFAULT_BASE_URL;

/// Credentials filename in the mail-trend config directory
const CREDENTIALS_FILE: &str = "graph-credentials.json";

/// Settings filename in the mail-trend config directory
const SETTINGS_FILE: &str = "settings.json";

/// App registration credentials for Graph application permissions
#[derive(Debug, Clone, Deserialize)]
pub struct GraphCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl GraphCredentials {
    /// Load credentials using the following priority:
    /// 1. Compile-time embedded credentials
    /// 2. JSON file (~/.config/mail-trend/graph-credentials.json)
    /// 3. Runtime environment variables
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GraphCredentials = config::load_json(CREDENTIALS_FILE)?;
            return creds.validated();
        }

        Self::from_env()
    }

    /// Load credentials embedded at compile time via environment variables.
    /// Build with: MAIL_TREND_TENANT_ID=.. MAIL_TREND_CLIENT_ID=.. MAIL_TREND_CLIENT_SECRET=.. cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let tenant_id = option_env!("MAIL_TREND_TENANT_ID")?;
        let client_id = option_env!("MAIL_TREND_CLIENT_ID")?;
        let client_secret = option_env!("MAIL_TREND_CLIENT_SECRET")?;

        Self {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
        .validated()
        .ok()
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GraphCredentials = config::load_json_file(path)?;
        creds.validated()
    }

    /// Parse credentials from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GraphCredentials =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        creds.validated()
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let tenant_id =
            std::env::var("GRAPH_TENANT_ID").context("GRAPH_TENANT_ID environment variable not set")?;
        let client_id =
            std::env::var("GRAPH_CLIENT_ID").context("GRAPH_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GRAPH_CLIENT_SECRET")
            .context("GRAPH_CLIENT_SECRET environment variable not set")?;

        Self {
            tenant_id,
            client_id,
            client_secret,
        }
        .validated()
    }

    fn validated(self) -> Result<Self> {
        anyhow::ensure!(!self.tenant_id.trim().is_empty(), "tenant_id is empty");
        anyhow::ensure!(!self.client_id.trim().is_empty(), "client_id is empty");
        anyhow::ensure!(!self.client_secret.trim().is_empty(), "client_secret is empty");
        Ok(self)
    }

    /// Get the default credentials file path (~/.config/mail-trend/graph-credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

/// Tuning knobs for a harvest run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    /// Graph API root, without trailing slash
    pub graph_base_url: String,
    /// Maximum in-flight HTTP requests across the whole run
    pub concurrency: usize,
    /// Attempts per request for folder and message listings
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub throttle_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// `$top` for every listing
    pub page_size: u32,
    /// Where reports are written; current directory when unset
    pub output_dir: Option<PathBuf>,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            graph_base_url: DEFAULT_BASE_URL.to_string(),
            concurrency: 7,
            retries: 3,
            retry_delay_ms: 5000,
            throttle_delay_ms: 1000,
            request_timeout_secs: 10,
            page_size: 100,
            output_dir: None,
        }
    }
}

impl HarvestSettings {
    /// Load `settings.json` from the config directory, or defaults if absent
    pub fn load() -> Result<Self> {
        if config::config_exists(SETTINGS_FILE) {
            return config::load_json(SETTINGS_FILE);
        }
        Ok(Self::default())
    }

    /// Parse settings from a JSON string; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse settings JSON")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry policy for listings
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retries.max(1),
            delay: Duration::from_millis(self.retry_delay_ms),
            throttle_delay: Duration::from_millis(self.throttle_delay_ms),
            timeout: self.request_timeout(),
        }
    }
}
