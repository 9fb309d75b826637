//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::routing::PatternError;

/// Environment variable replacing `cors.permitted_origins`.
pub const PERMITTED_CORS_ORIGINS: &str = "PERMITTED_CORS_ORIGINS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split a delimited origin list, dropping blanks.
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply process environment on top of file/default values.
pub fn apply_env_overrides(config: &mut GatewayConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

fn apply_overrides_from(config: &mut GatewayConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(raw) = lookup(PERMITTED_CORS_ORIGINS) {
        config.cors.permitted_origins = parse_origin_list(&raw);
    }
}

/// Parse and apply environment overrides, without validating.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let mut config: GatewayConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Read a TOML file (or defaults when no file is given) and apply
/// environment overrides. Callers layering further overrides must pass the
/// result through [`finish`].
pub fn read_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    match path {
        Some(path) => parse_config(&fs::read_to_string(path)?),
        None => {
            let mut config = GatewayConfig::default();
            apply_env_overrides(&mut config);
            Ok(config)
        }
    }
}

/// Load and validate configuration.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    finish(read_config(path)?)
}

/// Validate a configuration assembled in code.
pub fn finish(config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
