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

    #[error("Invalid value for {var}: '{value}'")]
    InvalidOverride { var: &'static str, value: String },

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

fn read_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Build the effective configuration: optional file, then process environment.
pub fn load(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    load_with(path, |var| std::env::var(var).ok())
}

/// Like [`load`], with overrides read through `lookup` instead of the environment.
pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => GatewayConfig::default(),
    };

    apply_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn parse<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOverride { var, value })
}

/// Overlay environment-style overrides onto `config`.
///
/// `lookup` returns the raw value of a variable, if set.
pub fn apply_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("WEATHERSTACK_API_KEY") {
        config.upstream.api_key = v;
    }
    if let Some(v) = lookup("WEATHERSTACK_BASE_URL") {
        config.upstream.base_url = v;
    }
    if let Some(v) = lookup("BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("LOG_LEVEL") {
        config.observability.log_level = v.to_lowercase();
    }
    if let Some(v) = lookup("CACHE_TTL_SECONDS") {
        config.cache.ttl_secs = parse("CACHE_TTL_SECONDS", v)?;
    }
    if let Some(v) = lookup("STALE_CACHE_MAX_AGE_SECONDS") {
        config.cache.stale_max_age_secs = parse("STALE_CACHE_MAX_AGE_SECONDS", v)?;
    }
    if let Some(v) = lookup("RATE_LIMIT_PER_MINUTE") {
        config.rate_limit.requests_per_minute = parse("RATE_LIMIT_PER_MINUTE", v)?;
    }
    if let Some(v) = lookup("RETRY_MAX_ATTEMPTS") {
        config.retries.max_attempts = parse("RETRY_MAX_ATTEMPTS", v)?;
    }
    if let Some(v) = lookup("RETRY_BACKOFF_BASE") {
        let secs: f64 = parse("RETRY_BACKOFF_BASE", v)?;
        config.retries.base_delay_ms = (secs * 1000.0).round() as u64;
    }
    if let Some(v) = lookup("CIRCUIT_BREAKER_FAILURE_THRESHOLD") {
        config.circuit_breaker.failure_threshold = parse("CIRCUIT_BREAKER_FAILURE_THRESHOLD", v)?;
    }
    if let Some(v) = lookup("CIRCUIT_BREAKER_RECOVERY_TIMEOUT") {
        config.circuit_breaker.recovery_timeout_secs =
            parse("CIRCUIT_BREAKER_RECOVERY_TIMEOUT", v)?;
    }
    if let Some(v) = lookup("CIRCUIT_BREAKER_FAILURE_RATE_THRESHOLD") {
        config.circuit_breaker.failure_rate_threshold =
            parse("CIRCUIT_BREAKER_FAILURE_RATE_THRESHOLD", v)?;
    }
    if let Some(v) = lookup("HTTP_CONNECT_TIMEOUT") {
        config.upstream.connect_timeout_secs = parse("HTTP_CONNECT_TIMEOUT", v)?;
    }
    if let Some(v) = lookup("HTTP_READ_TIMEOUT") {
        config.upstream.read_timeout_secs = parse("HTTP_READ_TIMEOUT", v)?;
    }
    if let Some(v) = lookup("HTTP_TOTAL_TIMEOUT") {
        config.upstream.total_timeout_secs = parse("HTTP_TOTAL_TIMEOUT", v)?;
    }
    Ok(())
}
