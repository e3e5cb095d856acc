//! Configuration management for repoharvest
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Upstream repository and pacing configuration
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarvestConfig {
    /// Advanced-search endpoint of the repository
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// `workType` filter (0 = any)
    #[serde(default)]
    pub work_type: u32,

    /// `language` filter (0 = any)
    #[serde(default)]
    pub language: u32,

    /// Only list works that have downloadable full text
    #[serde(default = "default_full_text_only")]
    pub full_text_only: bool,

    /// Minimum delay between two outbound requests, in milliseconds.
    /// Metadata pages and document downloads share this budget.
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// First backoff interval after a failed metadata fetch
    #[serde(default = "default_fetch_retry_initial")]
    pub fetch_retry_initial_ms: u64,

    /// Give up on a metadata page after retrying for this long
    #[serde(default = "default_fetch_retry_max_elapsed")]
    pub fetch_retry_max_elapsed_secs: u64,

    /// Documents of one work downloaded concurrently (still rate limited)
    #[serde(default = "default_file_concurrency")]
    pub file_concurrency: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name attached to every log line
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_max_connections() -> u32 { 5 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_search_url() -> String {
    "https://repozitorij.uni-lj.si/ajax.php".to_string()
}
fn default_full_text_only() -> bool { true }
fn default_request_delay() -> u64 { 1000 }
fn default_request_timeout() -> u64 { 60 }
fn default_fetch_retry_initial() -> u64 { 2000 }
fn default_fetch_retry_max_elapsed() -> u64 { 120 }
fn default_file_concurrency() -> usize { 1 }
fn default_user_agent() -> String {
    concat!("repoharvest/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_metrics_port() -> u16 { 0 }
fn default_service_name() -> String { "repoharvest".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__DATABASE__URL=postgres://...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }
}

impl HarvestConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fetch_retry_initial(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_initial_ms)
    }

    pub fn fetch_retry_max_elapsed(&self) -> Duration {
        Duration::from_secs(self.fetch_retry_max_elapsed_secs)
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            work_type: 0,
            language: 0,
            full_text_only: default_full_text_only(),
            request_delay_ms: default_request_delay(),
            request_timeout_secs: default_request_timeout(),
            fetch_retry_initial_ms: default_fetch_retry_initial(),
            fetch_retry_max_elapsed_secs: default_fetch_retry_max_elapsed(),
            file_concurrency: default_file_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/repoharvest".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            harvest: HarvestConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
