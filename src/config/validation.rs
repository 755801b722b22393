//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds within bounds)
//! - Check that dependent values agree (TTL below stale max age)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `cache.ttl_secs`).
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration, collecting every violation.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let upstream = &config.upstream;
    if let Err(e) = url::Url::parse(&upstream.base_url) {
        errors.push(ValidationError::new(
            "upstream.base_url",
            format!("invalid URL '{}': {}", upstream.base_url, e),
        ));
    }
    for (field, value) in [
        ("upstream.connect_timeout_secs", upstream.connect_timeout_secs),
        ("upstream.read_timeout_secs", upstream.read_timeout_secs),
        ("upstream.total_timeout_secs", upstream.total_timeout_secs),
    ] {
        if !value.is_finite() || value <= 0.0 {
            errors.push(ValidationError::new(field, "must be a positive number of seconds"));
        }
    }
    if upstream.total_timeout_secs < upstream.connect_timeout_secs {
        errors.push(ValidationError::new(
            "upstream.total_timeout_secs",
            "must not be shorter than the connect timeout",
        ));
    }

    let cache = &config.cache;
    if cache.ttl_secs == 0 {
        errors.push(ValidationError::new("cache.ttl_secs", "must be greater than 0"));
    }
    if cache.stale_max_age_secs <= cache.ttl_secs {
        errors.push(ValidationError::new(
            "cache.stale_max_age_secs",
            "must be greater than cache.ttl_secs",
        ));
    }
    if cache.max_entries == 0 {
        errors.push(ValidationError::new("cache.max_entries", "must be greater than 0"));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if retries.max_delay_ms < retries.base_delay_ms {
        errors.push(ValidationError::new(
            "retries.max_delay_ms",
            "must not be smaller than retries.base_delay_ms",
        ));
    }
    if !(0.0..=1.0).contains(&retries.jitter_ratio) {
        errors.push(ValidationError::new("retries.jitter_ratio", "must be within [0, 1]"));
    }

    let breaker = &config.circuit_breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be at least 1",
        ));
    }
    if !(breaker.failure_rate_threshold > 0.0 && breaker.failure_rate_threshold <= 1.0) {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_rate_threshold",
            "must be within (0, 1]",
        ));
    }
    if breaker.recovery_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.recovery_timeout_secs",
            "must be greater than 0",
        ));
    }
    if breaker.min_requests == 0 || breaker.window_size < breaker.min_requests {
        errors.push(ValidationError::new(
            "circuit_breaker.window_size",
            "window_size must be >= min_requests >= 1",
        ));
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.enabled && (rate_limit.requests_per_minute == 0 || rate_limit.burst == 0) {
        errors.push(ValidationError::new(
            "rate_limit",
            "requests_per_minute and burst must be positive when enabled",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
