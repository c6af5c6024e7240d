//! Environment variable overrides, applied on top of the YAML file

use super::{AppConfig, ConfigError};

pub const PRIMARY_URL_VAR: &str = "RAGFLOW_URL";
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const SECONDARY_URL_VAR: &str = "OPENAI_BASE_URL";
pub const MODEL_VAR: &str = "OPENAI_MODEL";
pub const PERSONA_VAR: &str = "FALLBACK_PERSONA";
pub const PHRASES_VAR: &str = "FALLBACK_PHRASES";
pub const SENTINEL_VAR: &str = "FALLBACK_SENTINEL_RETCODE";

/// Separator between entries of `FALLBACK_PHRASES`
const PHRASE_SEPARATOR: char = '|';

/// Apply overrides read through `lookup` (normally `std::env::var`)
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(url) = get(PRIMARY_URL_VAR) {
        config.primary.url = url;
    }
    if let Some(key) = get(API_KEY_VAR) {
        config.secondary.api_key = Some(key);
    }
    if let Some(url) = get(SECONDARY_URL_VAR) {
        config.secondary.base_url = url;
    }
    if let Some(model) = get(MODEL_VAR) {
        config.secondary.model = model;
    }
    if let Some(persona) = get(PERSONA_VAR) {
        config.secondary.persona = Some(persona);
    }
    if let Some(phrases) = get(PHRASES_VAR) {
        config.fallback.phrases = phrases
            .split(PHRASE_SEPARATOR)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(code) = get(SENTINEL_VAR) {
        config.fallback.sentinel_retcode = code.trim().parse().map_err(|_| {
            ConfigError::Validation(format!("{} must be an integer, got '{}'", SENTINEL_VAR, code))
        })?;
    }

    Ok(())
}

impl AppConfig {
    /// Apply overrides from the process environment
    pub fn with_process_env(mut self) -> Result<Self, ConfigError> {
        apply_env_overrides(&mut self, |name| std::env::var(name).ok())?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_no_overrides_keeps_file_values() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, lookup_from(&[])).unwrap();
        assert_eq!(config.primary.url, "http://ragflow:9380");
        assert!(config.secondary.api_key.is_none());
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("RAGFLOW_URL", "http://localhost:9380"),
                ("OPENAI_API_KEY", "sk-env"),
                ("OPENAI_BASE_URL", "http://localhost:1234/v1"),
                ("OPENAI_MODEL", "gpt-4o"),
                ("FALLBACK_PERSONA", "Be brief."),
                ("FALLBACK_SENTINEL_RETCODE", "102"),
            ]),
        )
        .unwrap();

        assert_eq!(config.primary.url, "http://localhost:9380");
        assert_eq!(config.secondary.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.secondary.base_url, "http://localhost:1234/v1");
        assert_eq!(config.secondary.model, "gpt-4o");
        assert_eq!(config.secondary.persona.as_deref(), Some("Be brief."));
        assert_eq!(config.fallback.sentinel_retcode, 102);
    }

    #[test]
    fn test_phrases_split_and_trimmed() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[("FALLBACK_PHRASES", "I don't know | | No answer|")]),
        )
        .unwrap();
        assert_eq!(config.fallback.phrases, vec!["I don't know", "No answer"]);
    }

    #[test]
    fn test_empty_value_ignored() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, lookup_from(&[("OPENAI_MODEL", "")])).unwrap();
        assert_eq!(config.secondary.model, "gpt-4");
    }

    #[test]
    fn test_bad_sentinel() {
        let mut config = AppConfig::default();
        let err = apply_env_overrides(
            &mut config,
            lookup_from(&[("FALLBACK_SENTINEL_RETCODE", "abc")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
