use std::path::Path;

use super::{AppConfig, ConfigError};

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    // An empty file deserializes to null, which serde_yaml rejects for a struct
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    let config: AppConfig = serde_yaml::from_str(&content)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PrimaryErrorPolicy, StatsFormat};

    #[test]
    fn test_load_missing_config() {
        let result = load_config("/nonexistent/config.yaml");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let dir = tempfile::TempDir::new().unwrap();
        let temp_file = dir.path().join("invalid.yaml");
        std::fs::write(&temp_file, "invalid: yaml: content: [").unwrap();

        let result = load_config(&temp_file);
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_valid() {
        let dir = tempfile::TempDir::new().unwrap();
        let temp_file = dir.path().join("config.yaml");

        let config_content = r#"
server:
  port: 8066
  host: "127.0.0.1"

primary:
  url: "http://kb.internal:9380"
  timeout_seconds: 10
  on_primary_error: silent
  extra_fields:
    stream: true

secondary:
  api_key: "sk-test"
  model: "gpt-4o-mini"
  persona: "You are a helpful support agent."

fallback:
  sentinel_retcode: 102
  phrases:
    - "I don't know"

stats:
  enabled: true
  format: "json"
"#;
        std::fs::write(&temp_file, config_content).unwrap();

        let config = load_config(&temp_file).unwrap();
        assert_eq!(config.server.port, 8066);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.route, "/v1/api/middleware");
        assert_eq!(config.primary.url, "http://kb.internal:9380");
        assert_eq!(config.primary.path, "/v1/api/completion");
        assert_eq!(config.primary.timeout_seconds, 10);
        assert_eq!(config.primary.on_primary_error, PrimaryErrorPolicy::Silent);
        assert_eq!(config.primary.extra_fields["stream"], serde_json::json!(true));
        assert_eq!(config.secondary.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.secondary.model, "gpt-4o-mini");
        assert_eq!(
            config.secondary.persona.as_deref(),
            Some("You are a helpful support agent.")
        );
        assert_eq!(config.fallback.sentinel_retcode, 102);
        assert_eq!(config.fallback.phrases, vec!["I don't know".to_string()]);
        assert_eq!(config.stats.format, StatsFormat::Json);
    }

    #[test]
    fn test_load_config_minimal() {
        let dir = tempfile::TempDir::new().unwrap();
        let temp_file = dir.path().join("minimal.yaml");
        std::fs::write(&temp_file, "secondary:\n  api_key: \"sk-x\"\n").unwrap();

        let config = load_config(&temp_file).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.fallback.sentinel_retcode, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_empty_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let temp_file = dir.path().join("empty.yaml");
        std::fs::write(&temp_file, "\n").unwrap();

        let config = load_config(&temp_file).unwrap();
        assert_eq!(config.primary.url, "http://ragflow:9380");
    }

    #[test]
    fn test_config_from_file() {
        let result = AppConfig::from_file("/nonexistent/path.yaml");
        assert!(result.is_err());
    }
}
