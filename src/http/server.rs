//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, rate limit)
//! - Bind server to listener and serve until shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer};
use crate::http::{health, weather};
use crate::observability::metrics::MetricsAggregator;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::weather::engine::WeatherEngine;
use crate::weather::upstream::Upstream;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WeatherEngine>,
    pub metrics: Arc<MetricsAggregator>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    pub fn new(
        engine: Arc<WeatherEngine>,
        metrics: Arc<MetricsAggregator>,
        rate_limiter: Option<Arc<RateLimiter>>,
    ) -> Self {
        Self {
            engine,
            metrics,
            rate_limiter,
        }
    }

    /// Wire the production engine around `upstream`.
    pub fn from_config(config: &GatewayConfig, upstream: Arc<dyn Upstream>) -> Self {
        let metrics = Arc::new(MetricsAggregator::default());
        let engine = WeatherEngine::from_config(config, upstream, metrics.clone());
        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(&config.rate_limit)));
        Self::new(Arc::new(engine), metrics, rate_limiter)
    }
}

/// HTTP server for the weather gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    pub fn new(config: GatewayConfig, state: AppState) -> Self {
        let router = build_router(&config, state);
        Self { router, config }
    }

    /// Run the server until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &GatewayConfig, state: AppState) -> Router {
    let mut weather_routes = Router::new().route("/weather", get(weather::get_weather));
    if let Some(limiter) = state.rate_limiter.clone() {
        weather_routes =
            weather_routes.route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
    }

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(health::metrics))
        .merge(weather_routes)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
                .layer(propagate_request_id_layer())
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
}
