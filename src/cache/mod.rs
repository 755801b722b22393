//! Response cache.
//!
//! # Data Flow
//! ```text
//! get(key):
//!     → entry.rs (age = now - fetched_at)
//!     → Fresh (age < ttl) | Stale (age < stale_max_age) | Miss
//!
//! put(key, value):
//!     → store.rs (last write wins, make room if full)
//! ```
//!
//! # Design Decisions
//! - Freshness is derived on read, never stored
//! - Expired entries are dropped lazily; no background sweeper

pub mod entry;
pub mod store;

pub use entry::{CacheEntry, CacheLookup, Freshness, Staleness};
pub use store::CacheStore;
