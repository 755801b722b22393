//! Weather lookups.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → engine.rs (cache / breaker / retry decisions)
//!     → upstream.rs (one Weatherstack call per attempt)
//!     → types.rs (payload + provenance metadata, or a typed error)
//! ```

pub mod engine;
pub mod types;
pub mod upstream;

pub use engine::WeatherEngine;
pub use types::{
    GatewayError, ResponseMetadata, Source, UpstreamError, WeatherData, WeatherFailure,
    WeatherResponse,
};
pub use upstream::{Upstream, WeatherstackClient};
