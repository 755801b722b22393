//! Service info, health, readiness and metrics endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::http::server::AppState;
use crate::observability::metrics::MetricsSnapshot;
use crate::resilience::circuit_breaker::{BreakerSnapshot, BreakerState};

pub const SERVICE_NAME: &str = "weather-gateway";

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Weather API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "weather": "/weather?city=<name>",
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
    pub circuit_breaker: BreakerSnapshot,
}

/// Always 200; `degraded` while the breaker is not closed.
pub async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    let breaker = state.engine.breaker().snapshot();
    let status = if breaker.state == BreakerState::Closed {
        "healthy"
    } else {
        "degraded"
    };
    Json(HealthBody {
        status,
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        service: SERVICE_NAME,
        circuit_breaker: breaker,
    })
}

/// 503 while the breaker is open, so load balancers stop routing here.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let breaker_state = state.engine.breaker().state();
    let ready = breaker_state != BreakerState::Open;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({ "ready": ready, "circuit_breaker_state": breaker_state })),
    )
}

#[derive(Debug, Serialize)]
pub struct MetricsBody {
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
    pub circuit_breaker: BreakerSnapshot,
    pub cache_entries: usize,
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsBody> {
    Json(MetricsBody {
        metrics: state.metrics.snapshot(),
        circuit_breaker: state.engine.breaker().snapshot(),
        cache_entries: state.engine.cache().len(),
    })
}
