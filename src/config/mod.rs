mod env;
mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub use env::apply_env_overrides;
pub use loader::load_config;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub primary: PrimaryConfig,
    #[serde(default)]
    pub secondary: SecondaryConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Proxy server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Route the mediated completion endpoint is mounted on
    #[serde(default = "default_route")]
    pub route: String,
}

fn default_port() -> u16 {
    8000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_route() -> String {
    "/v1/api/middleware".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            route: default_route(),
        }
    }
}

/// Primary (knowledge-base) backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrimaryConfig {
    /// Base URL (e.g., "http://ragflow:9380")
    #[serde(default = "default_primary_url")]
    pub url: String,
    /// Completion path appended to the base URL
    #[serde(default = "default_primary_path")]
    pub path: String,
    /// Bound on connecting and on every read of the streamed body
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// TLS configuration options
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// Fields merged into the forwarded JSON body, overriding inbound values
    #[serde(default)]
    pub extra_fields: HashMap<String, serde_json::Value>,
    /// What the client sees when the primary transport fails
    #[serde(default)]
    pub on_primary_error: PrimaryErrorPolicy,
}

fn default_primary_url() -> String {
    "http://ragflow:9380".to_string()
}

fn default_primary_path() -> String {
    "/v1/api/completion".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            url: default_primary_url(),
            path: default_primary_path(),
            timeout_seconds: default_timeout(),
            tls: None,
            extra_fields: HashMap::new(),
            on_primary_error: PrimaryErrorPolicy::default(),
        }
    }
}

impl PrimaryConfig {
    /// Returns the base URL with trailing slash stripped
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Full URL of the streaming completion endpoint
    pub fn completion_url(&self) -> String {
        format!("{}/{}", self.base_url(), self.path.trim_start_matches('/'))
    }

    /// Returns true if the URL uses HTTPS
    pub fn is_tls(&self) -> bool {
        self.url.to_lowercase().starts_with("https://")
    }
}

/// Behavior when the primary backend cannot be reached or its stream breaks
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryErrorPolicy {
    /// Emit one error content event, then the terminal frame
    #[default]
    Report,
    /// Emit only the terminal frame
    Silent,
}

/// Secondary (OpenAI-compatible chat completion) backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecondaryConfig {
    /// API base URL; `/chat/completions` is appended
    #[serde(default = "default_secondary_url")]
    pub base_url: String,
    /// Bearer credential
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Optional system message prepended to the conversation
    #[serde(default)]
    pub persona: Option<String>,
    /// Only the connection is bounded; the stream itself runs until the client leaves
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

fn default_secondary_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            base_url: default_secondary_url(),
            api_key: None,
            model: default_model(),
            persona: None,
            connect_timeout_seconds: default_connect_timeout(),
            tls: None,
        }
    }
}

impl SecondaryConfig {
    /// Returns the base URL with trailing slash stripped
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url())
    }
}

/// TLS configuration for backend connections
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Accept invalid certificates (self-signed, expired)
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Path to custom CA certificate (PEM format)
    pub ca_cert_path: Option<String>,
    /// Path to client certificate for mTLS
    pub client_cert_path: Option<String>,
    /// Path to client private key for mTLS
    pub client_key_path: Option<String>,
}

/// Conditions that switch a response over to the secondary backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    /// Primary status code meaning "no answer available"
    #[serde(default = "default_sentinel_retcode")]
    pub sentinel_retcode: i64,
    /// Case-sensitive substrings of the cumulative answer, checked in order
    #[serde(default = "default_phrases")]
    pub phrases: Vec<String>,
}

fn default_sentinel_retcode() -> i64 {
    100
}

fn default_phrases() -> Vec<String> {
    vec![
        "Sorry, I have insufficient information to answer your request".to_string(),
        "No relevant content was found in the knowledge base".to_string(),
    ]
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            sentinel_retcode: default_sentinel_retcode(),
            phrases: default_phrases(),
        }
    }
}

/// Per-request summary logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub format: StatsFormat,
}

fn default_stats_enabled() -> bool {
    true
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: default_stats_enabled(),
            format: StatsFormat::default(),
        }
    }
}

/// Stats output format
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StatsFormat {
    Pretty,
    Json,
    #[default]
    Compact,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Load configuration with fallback to defaults when no file exists
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) if path.exists() => Self::from_file(path),
            Some(path) => {
                tracing::debug!("No config file at {:?}, using defaults", path);
                Ok(Self::default())
            }
            None => {
                let default_paths = ["config.yaml", "config.yml", "./config/config.yaml"];
                for p in default_paths {
                    let path = Path::new(p);
                    if path.exists() {
                        return Self::from_file(path);
                    }
                }
                Ok(Self::default())
            }
        }
    }

    /// Check the settings the proxy cannot start without
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.primary.url)
            .map_err(|e| ConfigError::Validation(format!("primary.url '{}': {}", self.primary.url, e)))?;
        url::Url::parse(&self.secondary.base_url).map_err(|e| {
            ConfigError::Validation(format!("secondary.base_url '{}': {}", self.secondary.base_url, e))
        })?;

        match self.secondary.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::Validation(
                    "secondary.api_key is required (set OPENAI_API_KEY)".to_string(),
                ))
            }
        }

        if self.primary.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "primary.timeout_seconds must be greater than zero".to_string(),
            ));
        }

        if !self.server.route.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "server.route '{}' must start with '/'",
                self.server.route
            )));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.secondary.api_key = Some("sk-test".to_string());
        config
    }

    #[test]
    fn test_primary_completion_url() {
        let config = PrimaryConfig {
            url: "http://localhost:9380/".to_string(),
            ..PrimaryConfig::default()
        };
        assert_eq!(config.base_url(), "http://localhost:9380");
        assert_eq!(config.completion_url(), "http://localhost:9380/v1/api/completion");
    }

    #[test]
    fn test_primary_is_tls() {
        let mut config = PrimaryConfig::default();
        assert!(!config.is_tls());
        config.url = "HTTPS://kb.example.com".to_string();
        assert!(config.is_tls());
    }

    #[test]
    fn test_secondary_completions_url() {
        let config = SecondaryConfig {
            base_url: "http://localhost:1234/v1/".to_string(),
            ..SecondaryConfig::default()
        };
        assert_eq!(config.completions_url(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.route, "/v1/api/middleware");
        assert_eq!(config.primary.url, "http://ragflow:9380");
        assert_eq!(config.primary.timeout_seconds, 30);
        assert_eq!(config.primary.on_primary_error, PrimaryErrorPolicy::Report);
        assert_eq!(config.secondary.model, "gpt-4");
        assert!(config.secondary.persona.is_none());
        assert_eq!(config.fallback.sentinel_retcode, 100);
        assert_eq!(config.fallback.phrases.len(), 2);
    }

    #[test]
    fn test_primary_error_policy_serde() {
        let report: PrimaryErrorPolicy = serde_json::from_str("\"report\"").unwrap();
        let silent: PrimaryErrorPolicy = serde_json::from_str("\"silent\"").unwrap();
        assert_eq!(report, PrimaryErrorPolicy::Report);
        assert_eq!(silent, PrimaryErrorPolicy::Silent);
        assert_eq!(serde_json::to_string(&silent).unwrap(), "\"silent\"");
    }

    #[test]
    fn test_stats_format_serde() {
        assert_eq!(serde_json::to_string(&StatsFormat::Pretty).unwrap(), "\"pretty\"");
        let json: StatsFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(json, StatsFormat::Json);
        assert_eq!(StatsFormat::default(), StatsFormat::Compact);
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_api_key() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("api_key"));

        let mut blank = valid_config();
        blank.secondary.api_key = Some("   ".to_string());
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_validate_bad_url() {
        let mut config = valid_config();
        config.primary.url = "not a url".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("primary.url"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = valid_config();
        config.primary.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_route() {
        let mut config = valid_config();
        config.server.route = "v1/api/middleware".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_path_uses_defaults() {
        let config = AppConfig::load_or_default(Some(Path::new("/nonexistent/config.yaml"))).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::NotFound("test.yaml".to_string());
        assert!(err.to_string().contains("test.yaml"));

        let err = ConfigError::Parse(serde_yaml::from_str::<AppConfig>("server: [").unwrap_err());
        assert!(err.to_string().contains("parse"));
    }
}
