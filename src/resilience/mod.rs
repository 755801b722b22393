//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to upstream:
//!     → circuit_breaker.rs (admit, or fail fast while open)
//!     → retries.rs (bounded attempts, backoff.rs between them)
//!         → timeouts.rs (deadline on each attempt)
//!         → classify.rs (decide whether the failure is worth another attempt)
//!     → circuit_breaker.rs (record the final outcome)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Time is read through clock.rs so tests never wait on real timers
//! - Circuit breaker prevents cascading failures

pub mod backoff;
pub mod circuit_breaker;
pub mod classify;
pub mod clock;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerPermit, BreakerSettings, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use classify::{Classify, FailureClass};
pub use clock::{Clock, ManualClock, RecordingSleeper, SharedClock, Sleeper, SystemClock, TokioSleeper};
pub use retries::{RetryExecutor, RetryOutcome, RetryPolicy};
