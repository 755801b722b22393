//! Response mapping.
//!
//! # Responsibilities
//! - Serialize weather answers as `{data, metadata}`
//! - Map terminal errors to HTTP status codes
//! - Render error bodies as `{detail, error_type, metadata}`
//!
//! # Design Decisions
//! - Exhausted transient failures and an open breaker are both 503
//! - Client-side failures keep their upstream meaning (400/401/404/429)

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::weather::types::{
    GatewayError, ResponseMetadata, UpstreamError, WeatherFailure, WeatherResponse,
};

/// HTTP status for a terminal lookup error.
pub fn status_for(error: &GatewayError) -> StatusCode {
    match error {
        GatewayError::InvalidCity => StatusCode::BAD_REQUEST,
        GatewayError::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::Upstream { source, .. } => match source {
            UpstreamError::BadRequest(_) => StatusCode::BAD_REQUEST,
            UpstreamError::NotFound(_) => StatusCode::NOT_FOUND,
            UpstreamError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            UpstreamError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            UpstreamError::Timeout(_)
            | UpstreamError::Connect(_)
            | UpstreamError::Network(_)
            | UpstreamError::Server { .. }
            | UpstreamError::Decode(_) => StatusCode::SERVICE_UNAVAILABLE,
        },
    }
}

/// Client-facing message. Transient upstream detail stays in the logs.
fn detail_for(error: &GatewayError, status: StatusCode) -> String {
    if status == StatusCode::SERVICE_UNAVAILABLE {
        "Service temporarily unavailable. Please try again later.".to_string()
    } else {
        error.to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub error_type: &'static str,
    pub metadata: ResponseMetadata,
}

impl IntoResponse for WeatherFailure {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        let body = ErrorBody {
            detail: detail_for(&self.error, status),
            error_type: self.error.kind(),
            metadata: self.metadata,
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for WeatherResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
