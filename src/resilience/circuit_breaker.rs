//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: testing if upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold, or failure rate over the window > rate threshold
//! Open → Half-Open: on the first admission check after the recovery timeout
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails
//! ```
//!
//! # Design Decisions
//! - One breaker for the single upstream, constructed explicitly and shared by handle
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering upstream)
//! - In Half-Open only the probe's outcome moves the state; late reports from calls
//!   admitted while Closed update the counters only
//! - Recovery is checked lazily against an injected clock; no timers
//! - All upstream failures count, including client errors (see DESIGN.md)

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::CircuitBreakerConfig;
use crate::resilience::clock::{SharedClock, SystemClock};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Thresholds governing transitions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub failure_rate_threshold: f64,
    pub recovery_timeout: Duration,
    pub window_size: usize,
    pub min_requests: usize,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from(&CircuitBreakerConfig::default())
    }
}

impl From<&CircuitBreakerConfig> for BreakerSettings {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            failure_rate_threshold: config.failure_rate_threshold,
            recovery_timeout: Duration::from_secs(config.recovery_timeout_secs),
            window_size: config.window_size.max(1),
            min_requests: config.min_requests.max(1),
        }
    }
}

/// Point-in-time view for health and metrics reporting.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub failure_rate: f64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub state_changes: u64,
    pub open_for_secs: Option<f64>,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    /// Recent outcomes, `true` = success.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    total_successes: u64,
    total_failures: u64,
    state_changes: u64,
}

impl Inner {
    fn push_outcome(&mut self, success: bool, window_size: usize) {
        self.window.push_back(success);
        while self.window.len() > window_size {
            self.window.pop_front();
        }
    }

    fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failures = self.window.iter().filter(|ok| !**ok).count();
        failures as f64 / self.window.len() as f64
    }

    fn transition(&mut self, to: BreakerState) {
        self.state = to;
        self.state_changes += 1;
    }
}

/// Shared circuit breaker guarding the upstream provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    clock: SharedClock,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a breaker reading the system clock.
    pub fn new(settings: BreakerSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: BreakerSettings, clock: SharedClock) -> Self {
        Self {
            settings,
            clock,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                window: VecDeque::with_capacity(settings.window_size),
                opened_at: None,
                probe_in_flight: false,
                total_successes: 0,
                total_failures: 0,
                state_changes: 0,
            }),
        }
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Decide admission. Returns `Some(is_probe)` when the call may proceed.
    fn admit(&self) -> Option<bool> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Some(false),
            BreakerState::Open => {
                let now = self.clock.now();
                let recovered = inner
                    .opened_at
                    .map(|at| now.saturating_duration_since(at) >= self.settings.recovery_timeout)
                    .unwrap_or(true);
                if !recovered {
                    return None;
                }
                inner.transition(BreakerState::HalfOpen);
                inner.probe_in_flight = true;
                tracing::info!(state = "half_open", "Circuit breaker admitting recovery probe");
                Some(true)
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    None
                } else {
                    inner.probe_in_flight = true;
                    Some(true)
                }
            }
        }
    }

    /// Whether a call may go to the upstream right now.
    ///
    /// In Half-Open only the caller that receives `true` may probe; it must
    /// report the outcome through [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn allow(&self) -> bool {
        self.admit().is_some()
    }

    /// Admission with a guard that frees the probe slot if the caller goes away.
    pub fn try_acquire(self: &Arc<Self>) -> Option<BreakerPermit> {
        self.admit().map(|probe| BreakerPermit {
            breaker: self.clone(),
            probe,
            settled: false,
        })
    }

    /// Report a successful upstream call.
    ///
    /// Without a permit the caller is taken to be the one [`allow`](Self::allow)
    /// admitted, so in Half-Open this settles the probe.
    pub fn record_success(&self) {
        self.settle_success(true);
    }

    /// Report a failed upstream call. Returns `true` if this failure opened the circuit.
    pub fn record_failure(&self) -> bool {
        self.settle_failure(true)
    }

    /// In Half-Open only the probe decides the transition; other outcomes
    /// (calls admitted before the circuit opened) just update the counters.
    fn settle_success(&self, probe: bool) {
        let mut inner = self.inner.lock();
        inner.total_successes += 1;
        inner.consecutive_failures = 0;
        inner.push_outcome(true, self.settings.window_size);

        if inner.state == BreakerState::HalfOpen && probe {
            inner.transition(BreakerState::Closed);
            inner.probe_in_flight = false;
            inner.opened_at = None;
            inner.window.clear();
            tracing::info!(state = "closed", "Circuit breaker closed, upstream recovered");
        }
    }

    fn settle_failure(&self, probe: bool) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.total_failures += 1;
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.push_outcome(false, self.settings.window_size);

        match inner.state {
            BreakerState::HalfOpen if probe => {
                inner.transition(BreakerState::Open);
                inner.opened_at = Some(now);
                inner.probe_in_flight = false;
                tracing::warn!(state = "open", "Circuit breaker reopened after failed probe");
                true
            }
            BreakerState::HalfOpen => {
                tracing::debug!("Late failure from a pre-open call ignored while probing");
                false
            }
            BreakerState::Closed => {
                let failure_rate = inner.failure_rate();
                let rate_tripped = inner.window.len() >= self.settings.min_requests
                    && failure_rate > self.settings.failure_rate_threshold;
                if inner.consecutive_failures >= self.settings.failure_threshold || rate_tripped {
                    inner.transition(BreakerState::Open);
                    inner.opened_at = Some(now);
                    tracing::warn!(
                        state = "open",
                        consecutive_failures = inner.consecutive_failures,
                        failure_rate,
                        "Circuit breaker opened"
                    );
                    true
                } else {
                    false
                }
            }
            BreakerState::Open => false,
        }
    }

    fn release_probe(&self) {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::HalfOpen && inner.probe_in_flight {
            inner.probe_in_flight = false;
            tracing::debug!("Abandoned recovery probe released");
        }
    }

    /// Current state, without applying any pending time-based transition.
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = self.clock.now();
        let inner = self.inner.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            failure_rate: inner.failure_rate(),
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            state_changes: inner.state_changes,
            open_for_secs: inner
                .opened_at
                .map(|at| now.saturating_duration_since(at).as_secs_f64()),
        }
    }
}

/// Admission granted by [`CircuitBreaker::try_acquire`].
///
/// Dropping an unsettled probe permit frees the Half-Open probe slot.
#[derive(Debug)]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    probe: bool,
    settled: bool,
}

impl BreakerPermit {
    /// Whether this call is the Half-Open recovery probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.settle_success(self.probe);
    }

    /// Returns `true` if this failure opened the circuit.
    pub fn record_failure(mut self) -> bool {
        self.settled = true;
        self.breaker.settle_failure(self.probe)
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            self.breaker.release_probe();
        }
    }
}
