//! Model API key resolution.
//!
//! The key may be given inline, in a file (container secrets) or through an
//! environment variable. The first non-empty source wins, in that order.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::config::ModelConfig;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key configured (set model.api_key, model.api_key_file or model.api_key_env)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret file '{0}' is empty")]
    EmptyFile(PathBuf),

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// Where a secret may come from. Empty strings count as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub direct: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSource<'a> {
    pub fn for_model(config: &'a ModelConfig) -> Self {
        Self {
            direct: config.api_key.as_deref(),
            file: config.api_key_file.as_deref(),
            env_var: config.api_key_env.as_deref(),
        }
    }

    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        self.resolve_optional()?
            .ok_or(SecretError::NoSourceProvided)
    }

    /// `Ok(None)` when no source is configured at all. A configured source
    /// that cannot be read is still an error.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>, SecretError> {
        if let Some(value) = non_empty(self.direct) {
            return Ok(Some(SecretString::from(value.to_string())));
        }

        if let Some(path) = non_empty(self.file) {
            return read_secret_file(&expand_home(path)).map(Some);
        }

        if let Some(name) = non_empty(self.env_var) {
            return match std::env::var(name) {
                Ok(value) => Ok(Some(SecretString::from(value.trim().to_string()))),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Ok(None)
    }
}

/// Resolves the model API key from its configuration.
pub fn resolve_api_key(config: &ModelConfig) -> Result<SecretString, SecretError> {
    SecretSource::for_model(config).resolve()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn read_secret_file(path: &Path) -> Result<SecretString, SecretError> {
    let content = std::fs::read_to_string(path).map_err(|e| SecretError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(SecretError::EmptyFile(path.to_path_buf()));
    }
    Ok(SecretString::from(trimmed.to_string()))
}

/// Expands a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
