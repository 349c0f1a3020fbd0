//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for environment variable {var}")]
    Env { var: String, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, override from the process environment, and validate a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;
    finish(config)
}

/// Like [`load_config`], falling back to defaults when no path is given.
pub fn load_or_default(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => finish(GatewayConfig::default()),
    }
}

fn finish(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    apply_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    target: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(var) {
        *target = value.trim().parse().map_err(|_| ConfigError::Env {
            var: var.to_string(),
            value,
        })?;
    }
    Ok(())
}

/// Apply environment overrides through `lookup`.
///
/// Recognized variables: `PLANT_ID_API_KEY`, `PLANTNET_API_KEY`, and
/// `<PREFIX>_FAILURE_THRESHOLD`, `<PREFIX>_RESET_TIMEOUT_SECONDS`,
/// `<PREFIX>_SUCCESS_THRESHOLD`, `<PREFIX>_REQUEST_TIMEOUT_SECONDS` for the
/// prefixes `PLANT_ID` and `PLANTNET`.
pub fn apply_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup("PLANT_ID_API_KEY").filter(|k| !k.is_empty()) {
        config.plant_id.api_key = Some(key);
    }
    if let Some(key) = lookup("PLANTNET_API_KEY").filter(|k| !k.is_empty()) {
        config.plant_net.api_key = Some(key);
    }

    let p = &mut config.plant_id;
    parse_var(&lookup, "PLANT_ID_FAILURE_THRESHOLD", &mut p.failure_threshold)?;
    parse_var(&lookup, "PLANT_ID_RESET_TIMEOUT_SECONDS", &mut p.reset_timeout_secs)?;
    parse_var(&lookup, "PLANT_ID_SUCCESS_THRESHOLD", &mut p.success_threshold)?;
    parse_var(&lookup, "PLANT_ID_REQUEST_TIMEOUT_SECONDS", &mut p.request_timeout_secs)?;

    let p = &mut config.plant_net;
    parse_var(&lookup, "PLANTNET_FAILURE_THRESHOLD", &mut p.failure_threshold)?;
    parse_var(&lookup, "PLANTNET_RESET_TIMEOUT_SECONDS", &mut p.reset_timeout_secs)?;
    parse_var(&lookup, "PLANTNET_SUCCESS_THRESHOLD", &mut p.success_threshold)?;
    parse_var(&lookup, "PLANTNET_REQUEST_TIMEOUT_SECONDS", &mut p.request_timeout_secs)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_env_overrides_thresholds_and_keys() {
        let mut config = GatewayConfig::default();
        apply_overrides(
            &mut config,
            env(&[
                ("PLANT_ID_API_KEY", "secret"),
                ("PLANT_ID_FAILURE_THRESHOLD", "4"),
                ("PLANTNET_RESET_TIMEOUT_SECONDS", " 90 "),
            ]),
        )
        .unwrap();

        assert_eq!(config.plant_id.api_key.as_deref(), Some("secret"));
        assert_eq!(config.plant_id.failure_threshold, 4);
        assert_eq!(config.plant_net.reset_timeout_secs, 90);
        assert_eq!(config.plant_net.api_key, None);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = GatewayConfig::default();
        let err = apply_overrides(&mut config, env(&[("PLANTNET_SUCCESS_THRESHOLD", "two")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "PLANTNET_SUCCESS_THRESHOLD"));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [listener]
            bind_address = "127.0.0.1:9999"

            [plant_id]
            reset_timeout_secs = 120
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
        assert_eq!(config.plant_id.reset_timeout_secs, 120);
    }

    #[test]
    fn test_load_config_reports_validation_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cache]\nmax_entries = 0").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("cache.max_entries"));
    }
}
