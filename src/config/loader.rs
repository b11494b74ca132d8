//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported config format {0:?} (expected .toml, .yaml or .yml)")]
    UnsupportedFormat(String),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML or YAML file.
///
/// The format is chosen from the file extension.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let config: AppConfig = match extension.as_str() {
        "toml" => toml::from_str(&content)?,
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
