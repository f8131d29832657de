//! Server configuration loaded from an optional TOML file.
//!
//! A missing or empty file yields `Config::default()`. Unknown keys are
//! accepted but logged, since they are usually typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::http::RetryPolicy;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level server configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server listens on.
    pub bind_addr: String,

    /// SQLite database file, or `:memory:`.
    pub database_path: String,

    /// Base URL of the trending stories API.
    pub trending_base_url: String,

    /// Lifetime of freshness cache entries.
    pub cache_ttl_secs: u64,

    /// Maximum number of freshness cache entries.
    pub cache_capacity: usize,

    /// Upstream requests in flight per pipeline call.
    pub fetch_concurrency: usize,

    pub http_timeout_secs: u64,

    /// Retries for 429/5xx/truncated upstream responses.
    pub max_retries: u32,

    /// First retry delay; doubles on each further attempt.
    pub retry_base_delay_ms: u64,

    /// Subscribe the built-in default feeds at startup.
    pub seed_default_feeds: bool,

    /// Accept feed URLs on loopback and private networks.
    pub allow_private_feed_hosts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            database_path: "newsmux.db".to_string(),
            trending_base_url: crate::trending::DEFAULT_BASE_URL.to_string(),
            cache_ttl_secs: 300,
            cache_capacity: 1024,
            fetch_concurrency: 8,
            http_timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 2000,
            seed_default_feeds: true,
            allow_private_feed_hosts: false,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "bind_addr",
        "database_path",
        "trending_base_url",
        "cache_ttl_secs",
        "cache_capacity",
        "fetch_concurrency",
        "http_timeout_secs",
        "max_retries",
        "retry_base_delay_ms",
        "seed_default_feeds",
        "allow_private_feed_hosts",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check the size before reading so a huge file is never loaded
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), bind_addr = %config.bind_addr, "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration text. Blank input gives the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("cache_capacity must be at least 1".into()));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("http_timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: self.http_timeout(),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
