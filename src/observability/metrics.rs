//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define the sink the weather engine reports into
//! - Keep in-process counters and latency percentiles for `/metrics`
//! - Mirror everything to the `metrics` facade for Prometheus scraping
//!
//! # Metrics
//! - `weather_gateway_requests_total` (counter)
//! - `weather_gateway_errors_total` (counter): by `kind`
//! - `weather_gateway_timeouts_total` (counter)
//! - `weather_gateway_cache_hits_total`, `weather_gateway_cache_misses_total` (counters)
//! - `weather_gateway_stale_fallbacks_total` (counter)
//! - `weather_gateway_circuit_opens_total` (counter)
//! - `weather_gateway_retries_total` (counter)
//! - `weather_gateway_request_duration_seconds` (histogram)
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Percentiles over a bounded window of recent samples, not a full history

use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use parking_lot::Mutex;
use serde::Serialize;

/// Samples kept for percentile computation.
pub const DEFAULT_MAX_SAMPLES: usize = 1000;

/// Fire-and-forget recording interface used on the request path.
pub trait MetricsSink: Send + Sync + 'static {
    fn record_request(&self);
    fn record_error(&self, kind: &str);
    fn record_timeout(&self);
    fn record_cache_hit(&self);
    fn record_cache_miss(&self);
    fn record_stale_fallback(&self);
    fn record_circuit_open(&self);
    fn record_retries(&self, count: u32);
    fn record_duration(&self, duration: Duration);
}

/// In-process aggregator backing the `/metrics` endpoint.
#[derive(Debug)]
pub struct MetricsAggregator {
    requests: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    stale_fallbacks: AtomicU64,
    circuit_opens: AtomicU64,
    retries: AtomicU64,
    errors_by_kind: DashMap<String, u64>,
    durations: Mutex<VecDeque<f64>>,
    max_samples: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Counters {
    pub requests_total: u64,
    pub errors_total: u64,
    pub timeouts_total: u64,
    pub cache_hits_total: u64,
    pub cache_misses_total: u64,
    pub stale_fallbacks_total: u64,
    pub circuit_breaker_opens_total: u64,
    pub retry_attempts_total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rates {
    pub cache_hit_rate: f64,
    pub error_rate: f64,
}

/// Latency percentiles in seconds.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseTimes {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub counters: Counters,
    pub errors_by_type: BTreeMap<String, u64>,
    pub rates: Rates,
    pub response_times: ResponseTimes,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SAMPLES)
    }
}

impl MetricsAggregator {
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            stale_fallbacks: AtomicU64::new(0),
            circuit_opens: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            errors_by_kind: DashMap::new(),
            durations: Mutex::new(VecDeque::with_capacity(max_samples)),
            max_samples,
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);

        let mut sorted: Vec<f64> = self.durations.lock().iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        MetricsSnapshot {
            counters: Counters {
                requests_total: requests,
                errors_total: errors,
                timeouts_total: self.timeouts.load(Ordering::Relaxed),
                cache_hits_total: hits,
                cache_misses_total: misses,
                stale_fallbacks_total: self.stale_fallbacks.load(Ordering::Relaxed),
                circuit_breaker_opens_total: self.circuit_opens.load(Ordering::Relaxed),
                retry_attempts_total: self.retries.load(Ordering::Relaxed),
            },
            errors_by_type: self
                .errors_by_kind
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
            rates: Rates {
                cache_hit_rate: ratio(hits, hits + misses),
                error_rate: ratio(errors, requests),
            },
            response_times: ResponseTimes {
                p50: percentile(&sorted, 0.50),
                p95: percentile(&sorted, 0.95),
                p99: percentile(&sorted, 0.99),
                count: sorted.len(),
            },
        }
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Nearest-rank percentile of an ascending slice: index `floor(len * p)`, clamped.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((sorted.len() as f64) * p) as usize;
    sorted[index.min(sorted.len() - 1)]
}

impl MetricsSink for MetricsAggregator {
    fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        counter!("weather_gateway_requests_total").increment(1);
    }

    fn record_error(&self, kind: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        *self.errors_by_kind.entry(kind.to_string()).or_insert(0) += 1;
        counter!("weather_gateway_errors_total", "kind" => kind.to_string()).increment(1);
    }

    fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        counter!("weather_gateway_timeouts_total").increment(1);
    }

    fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        counter!("weather_gateway_cache_hits_total").increment(1);
    }

    fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        counter!("weather_gateway_cache_misses_total").increment(1);
    }

    fn record_stale_fallback(&self) {
        self.stale_fallbacks.fetch_add(1, Ordering::Relaxed);
        counter!("weather_gateway_stale_fallbacks_total").increment(1);
    }

    fn record_circuit_open(&self) {
        self.circuit_opens.fetch_add(1, Ordering::Relaxed);
        counter!("weather_gateway_circuit_opens_total").increment(1);
    }

    fn record_retries(&self, count: u32) {
        if count == 0 {
            return;
        }
        self.retries.fetch_add(u64::from(count), Ordering::Relaxed);
        counter!("weather_gateway_retries_total").increment(u64::from(count));
    }

    fn record_duration(&self, duration: Duration) {
        let secs = duration.as_secs_f64();
        {
            let mut durations = self.durations.lock();
            if durations.len() == self.max_samples {
                durations.pop_front();
            }
            durations.push_back(secs);
        }
        histogram!("weather_gateway_request_duration_seconds").record(secs);
    }
}

/// Install the Prometheus recorder with its own scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_prometheus(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!("weather_gateway_requests_total", "Weather lookups received");
    describe_counter!("weather_gateway_errors_total", "Lookups ending in an error, by kind");
    describe_counter!("weather_gateway_timeouts_total", "Lookups whose last upstream attempt timed out");
    describe_counter!("weather_gateway_cache_hits_total", "Lookups served from fresh cache");
    describe_counter!("weather_gateway_cache_misses_total", "Lookups that needed the upstream");
    describe_counter!("weather_gateway_stale_fallbacks_total", "Lookups served from stale cache");
    describe_counter!("weather_gateway_circuit_opens_total", "Circuit breaker open transitions");
    describe_counter!("weather_gateway_retries_total", "Upstream attempts beyond the first");
    describe_histogram!("weather_gateway_request_duration_seconds", "Weather lookup latency");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_nearest_rank() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(percentile(&sorted, 0.50), 51.0);
        assert_eq!(percentile(&sorted, 0.95), 96.0);
        assert_eq!(percentile(&sorted, 0.99), 100.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
        assert_eq!(percentile(&[3.0], 0.99), 3.0);
    }

    #[test]
    fn test_snapshot_rates_and_errors() {
        let metrics = MetricsAggregator::default();
        for _ in 0..4 {
            metrics.record_request();
        }
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        metrics.record_cache_miss();
        metrics.record_cache_miss();
        metrics.record_error("not_found");
        metrics.record_error("not_found");
        metrics.record_retries(2);
        metrics.record_retries(0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.counters.requests_total, 4);
        assert_eq!(snapshot.counters.retry_attempts_total, 2);
        assert_eq!(snapshot.errors_by_type.get("not_found"), Some(&2));
        assert_eq!(snapshot.rates.cache_hit_rate, 0.25);
        assert_eq!(snapshot.rates.error_rate, 0.5);
    }

    #[test]
    fn test_duration_window_is_bounded() {
        let metrics = MetricsAggregator::new(3);
        for ms in [100, 200, 300, 400] {
            metrics.record_duration(Duration::from_millis(ms));
        }
        let times = metrics.snapshot().response_times;
        assert_eq!(times.count, 3);
        assert_eq!(times.p50, 0.3);
    }

    #[test]
    fn test_empty_snapshot_is_zeroed() {
        let snapshot = MetricsAggregator::default().snapshot();
        assert_eq!(snapshot.rates.error_rate, 0.0);
        assert_eq!(snapshot.response_times.p99, 0.0);
        assert!(snapshot.errors_by_type.is_empty());
    }
}
