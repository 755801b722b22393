//! HTTP surface driven in-process through the router.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use common::{weather_payload, Harness, ScriptedUpstream};
use weather_gateway::config::{GatewayConfig, RateLimitConfig};
use weather_gateway::http::{build_router, AppState, X_REQUEST_ID};
use weather_gateway::security::RateLimiter;
use weather_gateway::weather::UpstreamError;

fn app(harness: &Harness, limiter: Option<Arc<RateLimiter>>) -> Router {
    let state = AppState::new(harness.engine.clone(), harness.metrics.clone(), limiter);
    build_router(&GatewayConfig::default(), state)
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn test_weather_from_fresh_cache() {
    let harness = Harness::new(ScriptedUpstream::always(Ok(weather_payload("Paris", 20))));
    harness.seed("paris", weather_payload("Paris", 18), Duration::from_secs(10));
    let app = app(&harness, None);

    let (status, headers, body) = get(&app, "/weather?city=Paris").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current"]["temperature"], 18);
    assert_eq!(body["metadata"]["source"], "cache");
    assert_eq!(body["metadata"]["cached"], true);
    assert_eq!(body["metadata"]["stale"], false);
    assert_eq!(body["metadata"]["retry_attempts"], 0);
    assert_eq!(body["metadata"]["circuit_breaker_state"], "closed");
    assert!(headers.contains_key(X_REQUEST_ID));
}

#[tokio::test]
async fn test_weather_from_api() {
    let harness = Harness::new(ScriptedUpstream::always(Ok(weather_payload("Oslo", -3))));
    let app = app(&harness, None);

    let (status, _, body) = get(&app, "/weather?city=oslo").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["source"], "api");
    assert_eq!(body["metadata"]["cached"], false);
}

#[tokio::test]
async fn test_blank_or_missing_city_is_400() {
    let harness = Harness::new(ScriptedUpstream::always(Ok(weather_payload("x", 0))));
    let app = app(&harness, None);

    for uri in ["/weather?city=%20%20", "/weather"] {
        let (status, _, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error_type"], "invalid_city");
        assert_eq!(body["detail"], "City parameter is required");
    }
    assert_eq!(harness.upstream.calls(), 0);
}

#[tokio::test]
async fn test_unknown_city_is_404() {
    let harness = Harness::new(ScriptedUpstream::always(Err(UpstreamError::NotFound(
        "City 'atlantis' not found".into(),
    ))));
    let app = app(&harness, None);

    let (status, _, body) = get(&app, "/weather?city=atlantis").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "City 'atlantis' not found");
    assert_eq!(body["error_type"], "not_found");
}

#[tokio::test]
async fn test_bad_credentials_are_401() {
    let harness = Harness::new(ScriptedUpstream::always(Err(UpstreamError::Unauthorized(
        "Invalid API key".into(),
    ))));
    let app = app(&harness, None);

    let (status, _, body) = get(&app, "/weather?city=london").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_type"], "unauthorized");
}

#[tokio::test]
async fn test_open_breaker_without_cache_is_503() {
    let harness = Harness::new(ScriptedUpstream::always(Ok(weather_payload("x", 0))));
    harness.open_breaker();
    let app = app(&harness, None);

    let (status, _, body) = get(&app, "/weather?city=atlantis").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error_type"], "circuit_breaker_open");
    assert!(body["metadata"]["source"].is_null());
    assert_eq!(body["metadata"]["circuit_breaker_state"], "open");
}

#[tokio::test]
async fn test_health_and_ready_follow_breaker() {
    let harness = Harness::new(ScriptedUpstream::always(Ok(weather_payload("x", 0))));
    let app = app(&harness, None);

    let (status, _, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "weather-gateway");
    assert_eq!(body["circuit_breaker"]["state"], "closed");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

    let (status, _, _) = get(&app, "/ready").await;
    assert_eq!(status, StatusCode::OK);

    harness.open_breaker();

    let (status, _, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");

    let (status, _, body) = get(&app, "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
}

#[tokio::test]
async fn test_metrics_endpoint_reports_counters() {
    let harness = Harness::new(ScriptedUpstream::always(Ok(weather_payload("Oslo", 1))));
    let app = app(&harness, None);

    get(&app, "/weather?city=oslo").await;
    get(&app, "/weather?city=oslo").await;
    let (status, _, body) = get(&app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counters"]["requests_total"], 2);
    assert_eq!(body["counters"]["cache_hits_total"], 1);
    assert_eq!(body["counters"]["cache_misses_total"], 1);
    assert_eq!(body["response_times"]["count"], 2);
    assert_eq!(body["circuit_breaker"]["state"], "closed");
    assert_eq!(body["cache_entries"], 1);
}

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let harness = Harness::new(ScriptedUpstream::always(Ok(weather_payload("Oslo", 1))));
    let limiter = Arc::new(RateLimiter::new(&RateLimitConfig {
        enabled: true,
        requests_per_minute: 60,
        burst: 2,
    }));
    let app = app(&harness, Some(limiter));

    for _ in 0..2 {
        let (status, _, _) = get(&app, "/weather?city=oslo").await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, headers, body) = get(&app, "/weather?city=oslo").await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["detail"], "Rate limit exceeded");
    assert!(headers.contains_key(header::RETRY_AFTER));

    // Health checks are not rate limited.
    let (status, _, _) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let harness = Harness::new(ScriptedUpstream::always(Ok(weather_payload("x", 0))));
    let app = app(&harness, None);

    let request = Request::builder()
        .uri("/health")
        .header(X_REQUEST_ID, "req-42")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&app, request).await;

    assert_eq!(headers.get(X_REQUEST_ID).unwrap(), "req-42");
}
