//! Harvester configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::SelectionCriteria;

/// Root harvester configuration.
///
/// Owned and validated by the embedding application's configuration loader;
/// the harvester only consumes it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// OAI-PMH endpoint and request behavior
    #[serde(default)]
    pub oai: OaiConfig,

    /// Retry/backoff policy for page requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Sync cycle windows, batching, and on-disk paths
    #[serde(default)]
    pub sync: SyncConfig,

    /// Default selection criteria for the output window
    #[serde(default)]
    pub selection: SelectionCriteria,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.oai.endpoint.trim().is_empty() {
            return Err(AppError::validation("oai.endpoint is empty"));
        }
        Url::parse(&self.oai.endpoint)
            .map_err(|e| AppError::validation(format!("oai.endpoint is not a valid URL: {e}")))?;
        if self.oai.metadata_prefix.trim().is_empty() {
            return Err(AppError::validation("oai.metadata_prefix is empty"));
        }
        if self.oai.set_spec.trim().is_empty() {
            return Err(AppError::validation("oai.set_spec is empty"));
        }
        if self.oai.user_agent.trim().is_empty() {
            return Err(AppError::validation("oai.user_agent is empty"));
        }
        if self.oai.timeout_secs == 0 {
            return Err(AppError::validation("oai.timeout_secs must be > 0"));
        }
        if self.retry.backoff_base <= 0.0 {
            return Err(AppError::validation("retry.backoff_base must be > 0"));
        }
        if self.retry.backoff_max <= 0.0 {
            return Err(AppError::validation("retry.backoff_max must be > 0"));
        }
        if self.sync.window_days == 0 {
            return Err(AppError::validation("sync.window_days must be > 0"));
        }
        if self.sync.flush_threshold == 0 {
            return Err(AppError::validation("sync.flush_threshold must be > 0"));
        }
        Ok(())
    }
}

/// OAI-PMH endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OaiConfig {
    /// Endpoint base URL
    #[serde(default = "defaults::endpoint")]
    pub endpoint: String,

    /// Metadata format requested from the endpoint
    #[serde(default = "defaults::metadata_prefix")]
    pub metadata_prefix: String,

    /// Set to harvest (e.g. "cs")
    #[serde(default = "defaults::set_spec")]
    pub set_spec: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between successive continuation pages in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,
}

impl Default for OaiConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::endpoint(),
            metadata_prefix: defaults::metadata_prefix(),
            set_spec: defaults::set_spec(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
        }
    }
}

/// Retry/backoff policy for page requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries per page request before the window is marked failed
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff, in seconds
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base: f64,

    /// Backoff ceiling, in seconds
    #[serde(default = "defaults::backoff_max")]
    pub backoff_max: f64,

    /// Apply a ±10% random factor to each delay
    #[serde(default = "defaults::jitter")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            backoff_base: defaults::backoff_base(),
            backoff_max: defaults::backoff_max(),
            jitter: defaults::jitter(),
        }
    }
}

/// Sync cycle settings and on-disk paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Root directory of the partitioned record store
    #[serde(default = "defaults::store_dir")]
    pub store_dir: PathBuf,

    /// Path of the harvest checkpoint file
    #[serde(default = "defaults::checkpoint_path")]
    pub checkpoint_path: PathBuf,

    /// Size of one harvest window, in days
    #[serde(default = "defaults::window_days")]
    pub window_days: u32,

    /// Records buffered in memory before a flush to the store
    #[serde(default = "defaults::flush_threshold")]
    pub flush_threshold: usize,

    /// Cycle start date used when no checkpoint exists yet
    #[serde(default = "defaults::bootstrap_start")]
    pub bootstrap_start: NaiveDate,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store_dir: defaults::store_dir(),
            checkpoint_path: defaults::checkpoint_path(),
            window_days: defaults::window_days(),
            flush_threshold: defaults::flush_threshold(),
            bootstrap_start: defaults::bootstrap_start(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use chrono::NaiveDate;

    // OAI defaults
    pub fn endpoint() -> String {
        "http://export.arxiv.org/oai2".into()
    }
    pub fn metadata_prefix() -> String {
        "arXiv".into()
    }
    pub fn set_spec() -> String {
        "cs".into()
    }
    pub fn user_agent() -> String {
        "arxiv-harvester/0.1".into()
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn request_delay() -> u64 {
        100
    }

    // Retry defaults
    pub fn max_retries() -> u32 {
        3
    }
    pub fn backoff_base() -> f64 {
        2.0
    }
    pub fn backoff_max() -> f64 {
        60.0
    }
    pub fn jitter() -> bool {
        true
    }

    // Sync defaults
    pub fn store_dir() -> PathBuf {
        PathBuf::from("data/store")
    }
    pub fn checkpoint_path() -> PathBuf {
        PathBuf::from("data/checkpoint.json")
    }
    pub fn window_days() -> u32 {
        7
    }
    pub fn flush_threshold() -> usize {
        500
    }
    pub fn bootstrap_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2007, 1, 1).unwrap_or(NaiveDate::MIN)
    }
}
