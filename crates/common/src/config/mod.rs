//! Configuration management for SourceFinder services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Generative-text service configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// URL probe configuration
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Search pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
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

    /// Request timeout in seconds, raised to the pipeline budget when shorter
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    #[serde(default = "default_database_url")]
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

    /// Apply pending migrations on startup
    #[serde(default = "default_enabled")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Provider: openai, mock
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key for the generative-text service
    pub api_key: Option<String>,

    /// API base URL (for OpenAI-compatible endpoints)
    #[serde(default = "default_llm_api_base")]
    pub api_base: String,

    /// Model to use for all three request shapes
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Sampling temperature (provider default when unset)
    pub temperature: Option<f32>,
}

/// When the pipeline probes extracted links
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// Never probe
    #[default]
    Off,
    /// Probe every extracted source, log and count the outcome, persist regardless
    Annotate,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub mode: ProbeMode,

    /// Per-request timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,

    /// Ask the probe to confirm the resource is a PDF
    #[serde(default)]
    pub want_pdf_check: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Directory for raw search/extraction dumps (disabled when unset)
    pub debug_dump_dir: Option<PathBuf>,
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
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Slack on top of the stage budgets for database writes
const PERSISTENCE_MARGIN_SECS: u64 = 30;

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 240 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_concurrent() -> usize { 64 }
fn default_database_url() -> String { "postgres://localhost/sourcefinder".to_string() }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_llm_api_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_llm_model() -> String { "gpt-4o".to_string() }
fn default_llm_timeout() -> u64 { 60 }
fn default_probe_timeout() -> u64 { 3 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_rate_limit() -> u32 { 5 }
fn default_burst() -> u32 { 20 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            run_migrations: default_enabled(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_base: default_llm_api_base(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            temperature: None,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            mode: ProbeMode::default(),
            timeout_secs: default_probe_timeout(),
            want_pdf_check: false,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl LlmConfig {
    /// Request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured key, ignoring blank values
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl ProbeConfig {
    /// Probe timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
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

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let mut config: Self = config.try_deserialize()?;
        config.apply_credential_fallback(std::env::var("OPENAI_API_KEY").ok());
        Ok(config)
    }

    /// Load from a specific config file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let mut config: Self = config.try_deserialize()?;
        config.apply_credential_fallback(std::env::var("OPENAI_API_KEY").ok());
        Ok(config)
    }

    /// Use the conventional `OPENAI_API_KEY` when no key was configured
    fn apply_credential_fallback(&mut self, fallback: Option<String>) {
        if self.llm.api_key().is_none() {
            self.llm.api_key = fallback.filter(|key| !key.trim().is_empty());
        }
    }

    /// Worst-case duration of one search run under the configured budgets
    ///
    /// Three generative-text calls, a HEAD plus a partial GET for every source
    /// when probing is on, and a margin for persistence.
    pub fn pipeline_budget(&self) -> Duration {
        let llm = self.llm.timeout_secs.saturating_mul(3);
        let probe = match self.probe.mode {
            ProbeMode::Off => 0,
            ProbeMode::Annotate => self
                .probe
                .timeout_secs
                .saturating_mul(2 * crate::pipeline::MAX_SOURCES as u64),
        };
        Duration::from_secs(llm.saturating_add(probe).saturating_add(PERSISTENCE_MARGIN_SECS))
    }

    /// Request timeout, never shorter than the pipeline budget
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs).max(self.pipeline_budget())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            llm: LlmConfig::default(),
            probe: ProbeConfig::default(),
            pipeline: PipelineConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.probe.mode, ProbeMode::Off);
        assert_eq!(config.probe.timeout(), Duration::from_secs(3));
        assert!(config.pipeline.debug_dump_dir.is_none());
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("   ".to_string());
        assert!(config.llm.api_key().is_none());
    }

    #[test]
    fn test_credential_fallback() {
        let mut config = AppConfig::default();
        config.apply_credential_fallback(Some("sk-fallback".to_string()));
        assert_eq!(config.llm.api_key(), Some("sk-fallback"));

        // An explicitly configured key wins
        config.llm.api_key = Some("sk-configured".to_string());
        config.apply_credential_fallback(Some("sk-fallback".to_string()));
        assert_eq!(config.llm.api_key(), Some("sk-configured"));
    }

    #[test]
    fn test_request_timeout_covers_pipeline_budget() {
        let mut config = AppConfig::default();
        assert_eq!(config.pipeline_budget(), Duration::from_secs(3 * 60 + 30));
        assert_eq!(config.request_timeout(), Duration::from_secs(240));

        // Probing adds a HEAD and a partial GET per source
        config.probe.mode = ProbeMode::Annotate;
        assert_eq!(config.pipeline_budget(), Duration::from_secs(3 * 60 + 8 * 2 * 3 + 30));
        assert_eq!(config.request_timeout(), config.pipeline_budget());

        // A configured timeout below the budget is raised
        config.server.request_timeout_secs = 10;
        assert_eq!(config.request_timeout(), config.pipeline_budget());

        config.server.request_timeout_secs = 600;
        assert_eq!(config.request_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_probe_mode_deserializes_lowercase() {
        let mode: ProbeMode = serde_json::from_str("\"annotate\"").unwrap();
        assert_eq!(mode, ProbeMode::Annotate);
    }
}
