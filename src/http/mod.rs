//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, request span)
//!     → security::rate_limit (per-IP bucket, /weather only)
//!     → weather.rs / health.rs (handlers)
//!     → response.rs (status mapping, JSON bodies)
//!     → Send to client
//! ```

pub mod health;
pub mod request;
pub mod response;
pub mod server;
pub mod weather;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{build_router, AppState, HttpServer};
