//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::env::apply_process_env;
use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment variable {var}: {reason}")]
    Env { var: String, reason: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Invalid route '{route}': {reason}")]
    Route { route: String, reason: String },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML document into a configuration without env overrides.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            tracing::info!(path = %path.display(), "Loading configuration file");
            parse_config(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_process_env(&mut config)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
