//! Configuration management for citenet
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Bibliographic provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Session (tab) management
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Co-authorship graph density control
    #[serde(default)]
    pub collaboration: CollaborationConfig,

    /// Snapshot persistence
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Inbound rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

/// Which bibliographic metadata provider backs the engine
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAlex,
    SemanticScholar,
    Crossref,
    OpenCitations,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Active provider
    #[serde(default = "default_provider_kind")]
    pub kind: ProviderKind,

    /// API base URL override (for mirrors and tests)
    pub base_url: Option<String>,

    /// API key, sent where the provider accepts one
    pub api_key: Option<String>,

    /// Contact e-mail for "polite pool" access (OpenAlex, Crossref)
    pub mailto: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures
    #[serde(default = "default_provider_retries")]
    pub max_retries: u32,

    /// Maximum ids per upstream request; larger stages are split
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Maximum number of open sessions before the oldest is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Maximum ranked candidates per suggestion direction
    #[serde(default = "default_suggestion_cap")]
    pub suggestion_cap: usize,

    /// Visible suggestions per direction for a fresh session
    #[serde(default = "default_visible_suggestions")]
    pub default_visible_suggestions: usize,

    /// Whether the seed article is part of the input set
    #[serde(default = "default_true")]
    pub include_source_in_input: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollaborationConfig {
    /// Upper bound on authors shown when the threshold is adaptive
    #[serde(default = "default_max_authors")]
    pub max_authors: usize,

    /// First threshold tried by the adaptive search
    #[serde(default = "default_start_threshold")]
    pub start_threshold: usize,
}

/// Where snapshots are written
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceBackend {
    File,
    Redis,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersistenceConfig {
    /// Opt-in snapshot persistence
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_persistence_backend")]
    pub backend: PersistenceBackend,

    /// Snapshot file path (file backend)
    #[serde(default = "default_snapshot_path")]
    pub path: String,

    /// Redis URL (redis backend)
    pub redis_url: Option<String>,

    /// Key prefix for namespacing (redis backend)
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Snapshot TTL in seconds (redis backend)
    #[serde(default = "default_snapshot_ttl")]
    pub ttl_secs: u64,
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

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_provider_kind() -> ProviderKind { ProviderKind::OpenAlex }
fn default_provider_timeout() -> u64 { 30 }
fn default_provider_retries() -> u32 { 3 }
fn default_max_batch_size() -> usize { 50 }
fn default_max_sessions() -> usize { 5 }
fn default_suggestion_cap() -> usize { 20 }
fn default_visible_suggestions() -> usize { 10 }
fn default_max_authors() -> usize { 50 }
fn default_start_threshold() -> usize { 2 }
fn default_persistence_backend() -> PersistenceBackend { PersistenceBackend::File }
fn default_snapshot_path() -> String { "data/sessions.json".to_string() }
fn default_key_prefix() -> String { "citenet".to_string() }
fn default_snapshot_ttl() -> u64 { 60 * 60 * 24 * 30 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "citenet".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_true() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            base_url: None,
            api_key: None,
            mailto: None,
            timeout_secs: default_provider_timeout(),
            max_retries: default_provider_retries(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            suggestion_cap: default_suggestion_cap(),
            default_visible_suggestions: default_visible_suggestions(),
            include_source_in_input: true,
        }
    }
}

impl Default for CollaborationConfig {
    fn default() -> Self {
        Self {
            max_authors: default_max_authors(),
            start_threshold: default_start_threshold(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: default_persistence_backend(),
            path: default_snapshot_path(),
            redis_url: None,
            key_prefix: default_key_prefix(),
            ttl_secs: default_snapshot_ttl(),
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

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            sessions: SessionConfig::default(),
            collaboration: CollaborationConfig::default(),
            persistence: PersistenceConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

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

            // e.g., APP__PROVIDER__KIND=crossref
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

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get provider timeout as Duration
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.provider.kind, ProviderKind::OpenAlex);
        assert_eq!(config.sessions.suggestion_cap, 20);
        assert_eq!(config.sessions.default_visible_suggestions, 10);
        assert_eq!(config.collaboration.max_authors, 50);
        assert_eq!(config.collaboration.start_threshold, 2);
        assert!(!config.persistence.enabled);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"provider": {"kind": "semantic_scholar"}, "sessions": {"max_sessions": 2}}"#,
        )
        .unwrap();
        assert_eq!(config.provider.kind, ProviderKind::SemanticScholar);
        assert_eq!(config.provider.max_retries, 3);
        assert_eq!(config.sessions.max_sessions, 2);
        assert_eq!(config.sessions.suggestion_cap, 20);
        assert!(config.sessions.include_source_in_input);
    }

    #[test]
    fn test_timeouts() {
        let config = AppConfig::default();
        assert_eq!(config.provider_timeout(), Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
    }
}
