//! Weather gateway (v1)
//!
//! A resilient weather lookup service built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http (request id, trace, timeout, rate limit)
//!                        │
//!                        ▼
//!                    weather::engine ──▶ cache (fresh? serve)
//!                        │
//!                        ▼
//!                    circuit breaker ──▶ open? stale or 503
//!                        │
//!                        ▼
//!                    retries + timeouts ──▶ Weatherstack
//!                        │
//!     Client Response    ▼
//!     ◀───────────── {data, metadata} or {detail, error_type, metadata}
//!
//!     Cross-cutting: config, observability (logs, metrics), lifecycle (signals)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use weather_gateway::config::loader;
use weather_gateway::http::{AppState, HttpServer};
use weather_gateway::lifecycle::{signals, Shutdown};
use weather_gateway::observability::{logging, metrics};
use weather_gateway::weather::WeatherstackClient;

#[derive(Parser)]
#[command(name = "weather-gateway")]
#[command(about = "Resilient weather lookup gateway", long_about = None)]
struct Args {
    /// TOML config file; defaults and environment variables apply without it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // A missing .env is normal outside development.
    let dotenv = dotenvy::dotenv();

    let mut config = loader::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "weather-gateway starting");
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        cache_ttl_secs = config.cache.ttl_secs,
        stale_max_age_secs = config.cache.stale_max_age_secs,
        retry_max_attempts = config.retries.max_attempts,
        breaker_failure_threshold = config.circuit_breaker.failure_threshold,
        breaker_recovery_secs = config.circuit_breaker.recovery_timeout_secs,
        rate_limit_per_minute = config.rate_limit.requests_per_minute,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_prometheus(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let upstream = Arc::new(WeatherstackClient::new(&config.upstream)?);
    let state = AppState::from_config(&config, upstream);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config, state);
    server.run(listener, shutdown.signalled()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
