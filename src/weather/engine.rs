//! Weather lookup engine.
//!
//! # Request Path
//! ```text
//! fetch(city)
//!     → normalize (blank → InvalidCity)
//!     → cache: Fresh → serve (source = cache), no breaker or upstream
//!     → breaker denies → stale ? serve (cache_fallback) : CircuitOpen
//!     → retry(upstream.current)
//!         → Success → cache.put, breaker success, serve (source = api)
//!         → Failure → breaker failure, stale ? serve (cache_fallback) : error
//! ```
//!
//! Every exit carries [`ResponseMetadata`] with the breaker state read after
//! this request's own breaker update. Denied requests always report `open`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{CacheLookup, CacheStore};
use crate::config::GatewayConfig;
use crate::observability::metrics::MetricsSink;
use crate::resilience::circuit_breaker::{BreakerSettings, BreakerState, CircuitBreaker};
use crate::resilience::retries::{RetryExecutor, RetryOutcome, RetryPolicy};
use crate::weather::types::{
    cache_key, normalize_city, GatewayError, ResponseMetadata, UpstreamError, WeatherData,
    WeatherFailure, WeatherResponse,
};
use crate::weather::upstream::Upstream;

/// Composes cache, circuit breaker, retries and the upstream into one lookup.
pub struct WeatherEngine {
    cache: CacheStore<WeatherData>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryExecutor,
    upstream: Arc<dyn Upstream>,
    metrics: Arc<dyn MetricsSink>,
}

impl WeatherEngine {
    pub fn new(
        cache: CacheStore<WeatherData>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryExecutor,
        upstream: Arc<dyn Upstream>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            cache,
            breaker,
            retry,
            upstream,
            metrics,
        }
    }

    /// Engine on the system clock and Tokio timers.
    pub fn from_config(
        config: &GatewayConfig,
        upstream: Arc<dyn Upstream>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self::new(
            CacheStore::new(&config.cache),
            Arc::new(CircuitBreaker::new(BreakerSettings::from(&config.circuit_breaker))),
            RetryExecutor::new(RetryPolicy::from(&config.retries)),
            upstream,
            metrics,
        )
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn cache(&self) -> &CacheStore<WeatherData> {
        &self.cache
    }

    /// Current weather for `city`, possibly from cache, always labelled.
    pub async fn fetch(&self, city: &str) -> Result<WeatherResponse, WeatherFailure> {
        let started = Instant::now();
        self.metrics.record_request();
        let result = self.resolve(city).await;
        self.metrics.record_duration(started.elapsed());
        result
    }

    async fn resolve(&self, city: &str) -> Result<WeatherResponse, WeatherFailure> {
        let Some(city) = normalize_city(city) else {
            self.metrics.record_error(GatewayError::InvalidCity.kind());
            return Err(WeatherFailure {
                error: GatewayError::InvalidCity,
                metadata: ResponseMetadata::unserved(0, self.breaker.state()),
            });
        };
        let key = cache_key(&city);

        let lookup = self.cache.get(&key);
        if let CacheLookup::Fresh { value, age } = lookup {
            self.metrics.record_cache_hit();
            tracing::debug!(city = %city, age_secs = age.as_secs(), "Serving fresh cached weather");
            return Ok(WeatherResponse {
                data: value,
                metadata: ResponseMetadata::fresh_cache(age.as_secs_f64(), self.breaker.state()),
            });
        }
        self.metrics.record_cache_miss();
        let stale = lookup.into_stale();

        let Some(permit) = self.breaker.try_acquire() else {
            tracing::warn!(city = %city, "Circuit breaker open, upstream not called");
            return self.fall_back(&city, stale, 0, GatewayError::CircuitOpen);
        };

        let outcome = self
            .retry
            .execute(|attempt| {
                tracing::debug!(city = %city, attempt, probe = permit.is_probe(), "Calling upstream");
                self.upstream.current(&city)
            })
            .await;
        let retries = outcome.attempts().saturating_sub(1);
        self.metrics.record_retries(retries);

        match outcome {
            RetryOutcome::Success { value, attempts, .. } => {
                self.cache.put(key, value.clone());
                permit.record_success();
                tracing::info!(city = %city, attempts, "Fetched weather from upstream");
                Ok(WeatherResponse {
                    data: value,
                    metadata: ResponseMetadata::api(retries, self.breaker.state()),
                })
            }
            RetryOutcome::Failure { error, class, attempts, .. } => {
                if permit.record_failure() {
                    self.metrics.record_circuit_open();
                }
                if matches!(error, UpstreamError::Timeout(_)) {
                    self.metrics.record_timeout();
                }
                tracing::warn!(
                    city = %city,
                    attempts,
                    class = class.as_str(),
                    error = %error,
                    "Upstream lookup failed"
                );
                self.fall_back(&city, stale, retries, GatewayError::Upstream { class, source: error })
            }
        }
    }

    /// Serve the stale value if there is one, otherwise surface `error`.
    fn fall_back(
        &self,
        city: &str,
        stale: Option<(WeatherData, Duration)>,
        retries: u32,
        error: GatewayError,
    ) -> Result<WeatherResponse, WeatherFailure> {
        self.metrics.record_error(error.kind());
        // A caller turned away while a recovery probe is outstanding sees Open.
        let state = match error {
            GatewayError::CircuitOpen => BreakerState::Open,
            _ => self.breaker.state(),
        };

        match stale {
            Some((data, age)) => {
                self.metrics.record_stale_fallback();
                tracing::info!(
                    city,
                    age_secs = age.as_secs(),
                    reason = error.kind(),
                    "Serving stale cached weather"
                );
                Ok(WeatherResponse {
                    data,
                    metadata: ResponseMetadata::fallback(age.as_secs_f64(), retries, state),
                })
            }
            None => {
                tracing::error!(city, error = %error, "No usable cached weather to fall back on");
                Err(WeatherFailure {
                    error,
                    metadata: ResponseMetadata::unserved(retries, state),
                })
            }
        }
    }
}
