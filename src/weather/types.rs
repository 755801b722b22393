//! Weather domain types: payloads, provenance metadata and errors.

use serde::Serialize;
use thiserror::Error;

use crate::resilience::circuit_breaker::BreakerState;
use crate::resilience::classify::FailureClass;

/// Raw provider payload, passed through untouched.
pub type WeatherData = serde_json::Value;

/// Failure of a single upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out: {0}")]
    Timeout(String),

    #[error("could not connect to upstream: {0}")]
    Connect(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("upstream rejected the request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("upstream rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("upstream authentication failed: {0}")]
    Unauthorized(String),

    #[error("invalid upstream response: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Stable label used in metrics and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Connect(_) => "connect_error",
            UpstreamError::Network(_) => "network_error",
            UpstreamError::Server { .. } => "upstream_server_error",
            UpstreamError::BadRequest(_) => "bad_request",
            UpstreamError::NotFound(_) => "not_found",
            UpstreamError::RateLimited(_) => "upstream_rate_limited",
            UpstreamError::Unauthorized(_) => "unauthorized",
            UpstreamError::Decode(_) => "decode_error",
        }
    }
}

/// Where the returned value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Api,
    Cache,
    CacheFallback,
}

/// Provenance attached to every response, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMetadata {
    pub cached: bool,
    pub stale: bool,
    pub age_seconds: f64,
    /// `None` when nothing was served.
    pub source: Option<Source>,
    pub retry_attempts: u32,
    pub circuit_breaker_state: BreakerState,
}

impl ResponseMetadata {
    pub fn fresh_cache(age_seconds: f64, state: BreakerState) -> Self {
        Self {
            cached: true,
            stale: false,
            age_seconds,
            source: Some(Source::Cache),
            retry_attempts: 0,
            circuit_breaker_state: state,
        }
    }

    pub fn api(retry_attempts: u32, state: BreakerState) -> Self {
        Self {
            cached: false,
            stale: false,
            age_seconds: 0.0,
            source: Some(Source::Api),
            retry_attempts,
            circuit_breaker_state: state,
        }
    }

    pub fn fallback(age_seconds: f64, retry_attempts: u32, state: BreakerState) -> Self {
        Self {
            cached: true,
            stale: true,
            age_seconds,
            source: Some(Source::CacheFallback),
            retry_attempts,
            circuit_breaker_state: state,
        }
    }

    pub fn unserved(retry_attempts: u32, state: BreakerState) -> Self {
        Self {
            cached: false,
            stale: false,
            age_seconds: 0.0,
            source: None,
            retry_attempts,
            circuit_breaker_state: state,
        }
    }
}

/// Successful answer.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherResponse {
    pub data: WeatherData,
    pub metadata: ResponseMetadata,
}

/// Terminal error of a weather lookup.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("City parameter is required")]
    InvalidCity,

    #[error("{source}")]
    Upstream {
        class: FailureClass,
        source: UpstreamError,
    },

    #[error("Service temporarily unavailable. Please try again later.")]
    CircuitOpen,
}

impl GatewayError {
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidCity => "invalid_city",
            GatewayError::Upstream { source, .. } => source.kind(),
            GatewayError::CircuitOpen => "circuit_breaker_open",
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            GatewayError::InvalidCity => FailureClass::NonRetryable,
            GatewayError::Upstream { class, .. } => *class,
            GatewayError::CircuitOpen => FailureClass::Critical,
        }
    }
}

/// A terminal error together with the metadata of the path that produced it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct WeatherFailure {
    pub error: GatewayError,
    pub metadata: ResponseMetadata,
}

/// Trimmed, lower-cased city name, or `None` if blank.
pub fn normalize_city(city: &str) -> Option<String> {
    let trimmed = city.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Cache key for a normalized city.
pub fn cache_key(city: &str) -> String {
    format!("weather:{city}")
}
