//! Per-client rate limiting middleware.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use serde_json::json;

use crate::config::RateLimitConfig;
use crate::resilience::clock::{SharedClock, SystemClock};

/// Buckets tracked before idle (full) ones are pruned.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn refill(&mut self, now: Instant, capacity: f64, refill_rate: f64) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;
    }

    /// Take a token, or report how long until one is available.
    fn try_acquire(&mut self, now: Instant, capacity: f64, refill_rate: f64) -> Result<(), Duration> {
        self.refill(now, capacity, refill_rate);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(missing / refill_rate))
        }
    }
}

/// Token buckets keyed by client IP.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<IpAddr, TokenBucket>>,
    capacity: f64,
    refill_per_sec: f64,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &RateLimitConfig, clock: SharedClock) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            capacity: f64::from(config.burst.max(1)),
            refill_per_sec: f64::from(config.requests_per_minute.max(1)) / 60.0,
            clock,
        }
    }

    /// Admit one request from `client`, or return the wait before the next token.
    pub fn check(&self, client: IpAddr) -> Result<(), Duration> {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock();

        if buckets.len() >= MAX_TRACKED_CLIENTS && !buckets.contains_key(&client) {
            let (capacity, rate) = (self.capacity, self.refill_per_sec);
            buckets.retain(|_, bucket| {
                bucket.refill(now, capacity, rate);
                bucket.tokens < capacity
            });
        }

        buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(self.capacity, now))
            .try_acquire(now, self.capacity, self.refill_per_sec)
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// Middleware rejecting clients that exhausted their bucket.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match limiter.check(addr.ip()) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            tracing::warn!(client = %addr.ip(), path = %request.uri().path(), "Rate limit exceeded");
            let retry_after = wait.as_secs_f64().ceil().max(1.0) as u64;
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "detail": "Rate limit exceeded" })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;

    fn limiter(per_minute: u32, burst: u32) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = RateLimitConfig {
            enabled: true,
            requests_per_minute: per_minute,
            burst,
        };
        (RateLimiter::with_clock(&config, clock.clone()), clock)
    }

    #[test]
    fn test_burst_then_reject() {
        let (limiter, _) = limiter(60, 3);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        for _ in 0..3 {
            assert!(limiter.check(ip).is_ok());
        }
        let wait = limiter.check(ip).unwrap_err();
        assert!(wait <= Duration::from_secs(1));
    }

    #[test]
    fn test_refills_over_time() {
        let (limiter, clock) = limiter(60, 1);
        let ip: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(limiter.check(ip).is_ok());
        assert!(limiter.check(ip).is_err());
        clock.advance(Duration::from_secs(1));
        assert!(limiter.check(ip).is_ok());
    }

    #[test]
    fn test_clients_are_independent() {
        let (limiter, _) = limiter(60, 1);
        assert!(limiter.check("10.0.0.3".parse().unwrap()).is_ok());
        assert!(limiter.check("10.0.0.4".parse().unwrap()).is_ok());
        assert_eq!(limiter.tracked_clients(), 2);
    }
}
