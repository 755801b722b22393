//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP token bucket, 429 when exhausted)
//!     → Pass to routing
//! ```

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimiter};
