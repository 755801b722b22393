//! Retry logic.
//!
//! # Responsibilities
//! - Drive bounded attempts of an upstream operation
//! - Wait with exponential backoff between attempts
//! - Stop early when a failure is classified non-retryable
//!
//! # Design Decisions
//! - Unaware of the circuit breaker; the caller decides whether to run it
//! - Never errors past its contract: returns a typed outcome with the attempt count
//! - Dropping the returned future abandons remaining attempts and any in-flight call

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::classify::{Classify, FailureClass};
use crate::resilience::clock::{Sleeper, TokioSleeper};

/// Attempt budget and backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_ratio: config.jitter_ratio,
        }
    }
}

/// Result of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failed(FailureClass),
}

/// Bookkeeping for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    /// Backoff waited before this attempt started.
    pub delay_before: Duration,
}

/// Final outcome of [`RetryExecutor::execute`].
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Success {
        value: T,
        attempts: u32,
        history: Vec<AttemptRecord>,
    },
    Failure {
        error: E,
        class: FailureClass,
        attempts: u32,
        history: Vec<AttemptRecord>,
    },
}

impl<T, E> RetryOutcome<T, E> {
    /// Number of attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. } | RetryOutcome::Failure { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn history(&self) -> &[AttemptRecord] {
        match self {
            RetryOutcome::Success { history, .. } | RetryOutcome::Failure { history, .. } => history,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success { .. })
    }
}

/// Runs an operation under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails non-retryably, or the budget is spent.
    ///
    /// `operation` receives the 1-based attempt number.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        E: Classify + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut history = Vec::with_capacity(self.policy.max_attempts as usize);
        let mut delay_before = Duration::ZERO;
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    history.push(AttemptRecord {
                        attempt,
                        outcome: AttemptOutcome::Success,
                        delay_before,
                    });
                    if attempt > 1 {
                        tracing::debug!(attempts = attempt, "Operation succeeded after retries");
                    }
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt,
                        history,
                    };
                }
                Err(error) => {
                    let class = error.classify();
                    history.push(AttemptRecord {
                        attempt,
                        outcome: AttemptOutcome::Failed(class),
                        delay_before,
                    });

                    if !class.is_retryable() {
                        tracing::debug!(attempt, class = class.as_str(), error = %error, "Non-retryable failure");
                        return RetryOutcome::Failure {
                            error,
                            class,
                            attempts: attempt,
                            history,
                        };
                    }

                    if attempt >= self.policy.max_attempts {
                        tracing::warn!(
                            attempts = attempt,
                            error = %error,
                            "Retry budget exhausted"
                        );
                        return RetryOutcome::Failure {
                            error,
                            class,
                            attempts: attempt,
                            history,
                        };
                    }

                    delay_before = calculate_backoff(
                        attempt,
                        self.policy.base_delay,
                        self.policy.max_delay,
                        self.policy.jitter_ratio,
                    );
                    tracing::warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay = ?delay_before,
                        error = %error,
                        "Attempt failed, retrying"
                    );
                    self.sleeper.sleep(delay_before).await;
                    attempt += 1;
                }
            }
        }
    }
}
