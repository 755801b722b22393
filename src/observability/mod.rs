//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Weather engine and HTTP layer produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, latency window, Prometheus facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → GET /metrics (JSON snapshot)
//!     → Prometheus scrape listener (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all request spans
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use metrics::{MetricsAggregator, MetricsSink, MetricsSnapshot};
