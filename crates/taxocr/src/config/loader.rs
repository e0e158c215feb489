use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.limits.soft_limit_secs >= config.limits.hard_limit_secs {
        return Err(ConfigError::Validation {
            message: format!(
                "Soft time limit ({}s) must be below the hard limit ({}s)",
                config.limits.soft_limit_secs, config.limits.hard_limit_secs
            ),
        });
    }

    let stale_after_secs = config.dispatcher.stale_after_mins.saturating_mul(60);
    let hard_limit_secs = i64::try_from(config.limits.hard_limit_secs).unwrap_or(i64::MAX);
    if stale_after_secs <= hard_limit_secs {
        return Err(ConfigError::Validation {
            message: format!(
                "Stale timeout ({} min) must exceed the hard limit ({}s)",
                config.dispatcher.stale_after_mins, config.limits.hard_limit_secs
            ),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    let endpoint = config.model.endpoint.trim();
    if !endpoint.is_empty() && !endpoint.starts_with("http://") && !endpoint.starts_with("https://")
    {
        return Err(ConfigError::Validation {
            message: format!("Model endpoint must be an http(s) URL: {}", endpoint),
        });
    }

    Ok(())
}
