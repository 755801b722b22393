//! Cache entries and lookup results.

use std::time::{Duration, Instant};

/// Last successfully fetched value for a key.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: Instant,
    /// Monotonic write number, distinguishes two puts with the same timestamp.
    pub(crate) generation: u64,
}

impl<V> CacheEntry<V> {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }
}

/// Freshness windows applied at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    pub ttl: Duration,
    pub stale_max_age: Duration,
}

impl Freshness {
    /// Classify an entry of the given age.
    pub fn classify(&self, age: Duration) -> Staleness {
        if age < self.ttl {
            Staleness::Fresh
        } else if age < self.stale_max_age {
            Staleness::Stale
        } else {
            Staleness::Expired
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Stale,
    Expired,
}

/// Result of [`CacheStore::get`](super::CacheStore::get).
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<V> {
    Fresh { value: V, age: Duration },
    Stale { value: V, age: Duration },
    /// No entry, or one past the stale window.
    Miss,
}

impl<V> CacheLookup<V> {
    pub fn is_fresh(&self) -> bool {
        matches!(self, CacheLookup::Fresh { .. })
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, CacheLookup::Miss)
    }

    pub fn age(&self) -> Option<Duration> {
        match self {
            CacheLookup::Fresh { age, .. } | CacheLookup::Stale { age, .. } => Some(*age),
            CacheLookup::Miss => None,
        }
    }

    /// Take the stale value and its age, if this lookup found one.
    pub fn into_stale(self) -> Option<(V, Duration)> {
        match self {
            CacheLookup::Stale { value, age } => Some((value, age)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_boundaries() {
        let freshness = Freshness {
            ttl: Duration::from_secs(300),
            stale_max_age: Duration::from_secs(3600),
        };
        assert_eq!(freshness.classify(Duration::from_secs(0)), Staleness::Fresh);
        assert_eq!(freshness.classify(Duration::from_millis(299_999)), Staleness::Fresh);
        assert_eq!(freshness.classify(Duration::from_secs(300)), Staleness::Stale);
        assert_eq!(freshness.classify(Duration::from_millis(3_599_999)), Staleness::Stale);
        assert_eq!(freshness.classify(Duration::from_secs(3600)), Staleness::Expired);
    }
}
