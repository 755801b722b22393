//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use weather_gateway::cache::CacheStore;
use weather_gateway::config::GatewayConfig;
use weather_gateway::observability::MetricsAggregator;
use weather_gateway::resilience::{
    BreakerSettings, CircuitBreaker, ManualClock, RecordingSleeper, RetryExecutor, RetryPolicy,
};
use weather_gateway::weather::{Upstream, UpstreamError, WeatherData, WeatherEngine};

/// Sample provider payload for `city`.
pub fn weather_payload(city: &str, temperature: i64) -> Value {
    json!({
        "location": { "name": city },
        "current": { "temperature": temperature, "weather_descriptions": ["Partly cloudy"] }
    })
}

/// Upstream fake replaying a script of outcomes, repeating the last one.
pub struct ScriptedUpstream {
    script: Mutex<VecDeque<Result<WeatherData, UpstreamError>>>,
    last: Mutex<Option<Result<WeatherData, UpstreamError>>>,
    calls: AtomicU32,
    stalled: AtomicBool,
}

impl ScriptedUpstream {
    pub fn new(script: Vec<Result<WeatherData, UpstreamError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
            stalled: AtomicBool::new(false),
        })
    }

    pub fn always(outcome: Result<WeatherData, UpstreamError>) -> Arc<Self> {
        Self::new(vec![outcome])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make subsequent calls hang until [`resume`](Self::resume).
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.stalled.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn current(&self, _city: &str) -> Result<WeatherData, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let next = self.script.lock().pop_front();
        match next {
            Some(outcome) => {
                *self.last.lock() = Some(outcome.clone());
                outcome
            }
            None => self
                .last
                .lock()
                .clone()
                .unwrap_or_else(|| Err(UpstreamError::Network("script exhausted".into()))),
        }
    }
}

/// Engine wired to a manual clock, a recording sleeper and a scripted upstream.
pub struct Harness {
    pub engine: Arc<WeatherEngine>,
    pub clock: Arc<ManualClock>,
    pub sleeper: Arc<RecordingSleeper>,
    pub metrics: Arc<MetricsAggregator>,
    pub upstream: Arc<ScriptedUpstream>,
}

impl Harness {
    pub fn new(upstream: Arc<ScriptedUpstream>) -> Self {
        Self::with_config(&GatewayConfig::default(), upstream)
    }

    pub fn with_config(config: &GatewayConfig, upstream: Arc<ScriptedUpstream>) -> Self {
        let clock = Arc::new(ManualClock::new());
        let sleeper = Arc::new(RecordingSleeper::with_clock(clock.clone()));
        let metrics = Arc::new(MetricsAggregator::default());

        let engine = WeatherEngine::new(
            CacheStore::with_clock(&config.cache, clock.clone()),
            Arc::new(CircuitBreaker::with_clock(
                BreakerSettings::from(&config.circuit_breaker),
                clock.clone(),
            )),
            RetryExecutor::with_sleeper(RetryPolicy::from(&config.retries), sleeper.clone()),
            upstream.clone(),
            metrics.clone(),
        );

        Self {
            engine: Arc::new(engine),
            clock,
            sleeper,
            metrics,
            upstream,
        }
    }

    /// Seed the cache for `city` and age the entry by `age`.
    ///
    /// Moves the shared clock forward, so seed before anything time-sensitive.
    pub fn seed(&self, city: &str, value: WeatherData, age: Duration) {
        self.engine.cache().put(format!("weather:{city}"), value);
        self.clock.advance(age);
    }

    /// Drive the breaker open with five recorded failures.
    pub fn open_breaker(&self) {
        let breaker = self.engine.breaker();
        for _ in 0..breaker.settings().failure_threshold {
            breaker.record_failure();
        }
    }
}

/// Start a programmable HTTP backend on an ephemeral port.
///
/// `f` is called per request with the raw request head and returns
/// `(status, body, delay)`; the response is sent after `delay`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String, Duration)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let head = String::from_utf8_lossy(&buf[..n]).to_string();

                        let (status, body, delay) = f(head).await;
                        tokio::time::sleep(delay).await;

                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            401 => "401 Unauthorized",
                            404 => "404 Not Found",
                            422 => "422 Unprocessable Entity",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
