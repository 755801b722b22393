//! Failure classification.
//!
//! # Classes
//! - Retryable: timeouts, connection failures, 5xx, generic network errors
//! - NonRetryable: 4xx client errors (bad input, unknown city, upstream rate limit)
//! - Critical: bad credentials, or the circuit breaker refusing the call
//!
//! Classification is a pure function of the outcome; it holds no state.

use serde::Serialize;

use crate::weather::types::UpstreamError;

/// How a failed outcome should be treated by retry and fallback logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Retryable,
    NonRetryable,
    Critical,
}

impl FailureClass {
    /// Whether another attempt may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureClass::Retryable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureClass::Retryable => "retryable",
            FailureClass::NonRetryable => "non_retryable",
            FailureClass::Critical => "critical",
        }
    }
}

/// Outcomes that can be classified.
pub trait Classify {
    fn classify(&self) -> FailureClass;
}

/// Classify a single upstream failure.
pub fn classify(error: &UpstreamError) -> FailureClass {
    match error {
        UpstreamError::Timeout(_)
        | UpstreamError::Connect(_)
        | UpstreamError::Network(_)
        | UpstreamError::Server { .. }
        | UpstreamError::Decode(_) => FailureClass::Retryable,
        UpstreamError::BadRequest(_)
        | UpstreamError::NotFound(_)
        | UpstreamError::RateLimited(_) => FailureClass::NonRetryable,
        UpstreamError::Unauthorized(_) => FailureClass::Critical,
    }
}

impl Classify for UpstreamError {
    fn classify(&self) -> FailureClass {
        classify(self)
    }
}
