//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{GatewayConfig, LoggingConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML file into a configuration without validating it.
pub fn read_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load configuration from an optional file, apply environment overrides,
/// then validate.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply overrides from a variable lookup (the process environment in production).
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup("JWT_SECRET_KEY") {
        config.auth.secret_key = secret;
    }
    if let Some(addr) = lookup("HTTP_ADDR") {
        config.server.bind_address = addr;
    }
    if let Some(url) = lookup("REDIS_URL") {
        config.counter_store.redis_url = url;
    }

    let limits = &mut config.rate_limit;
    if let Some(value) = lookup("RATE_LIMIT_ENABLED") {
        limits.enabled = parse_bool("RATE_LIMIT_ENABLED", value)?;
    }
    override_u32(&lookup, "RATE_LIMIT_PUBLIC_RPS", &mut limits.public_rps)?;
    override_u32(&lookup, "RATE_LIMIT_PUBLIC_BURST", &mut limits.public_burst)?;
    override_u32(&lookup, "RATE_LIMIT_AUTH_RPS", &mut limits.auth_rps)?;
    override_u32(&lookup, "RATE_LIMIT_AUTH_BURST", &mut limits.auth_burst)?;

    let LoggingConfig { level, encoding } = &mut config.logging;
    if let Some(value) = lookup("LOG_LEVEL") {
        *level = value;
    }
    if let Some(value) = lookup("LOG_ENCODING") {
        *encoding = value;
    }

    Ok(())
}

fn override_u32<F>(lookup: &F, key: &'static str, slot: &mut u32) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(key) {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { key, value })?;
    }
    Ok(())
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env { key, value }),
    }
}
