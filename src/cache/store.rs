//! Concurrent TTL cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::cache::entry::{CacheEntry, CacheLookup, Freshness, Staleness};
use crate::config::CacheConfig;
use crate::resilience::clock::{SharedClock, SystemClock};

/// Key → last good value, with freshness computed on read.
///
/// Cloning shares the underlying map.
#[derive(Clone)]
pub struct CacheStore<V> {
    inner: Arc<DashMap<String, CacheEntry<V>>>,
    freshness: Freshness,
    max_entries: usize,
    clock: SharedClock,
    generation: Arc<AtomicU64>,
}

impl<V: Clone> CacheStore<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            freshness: Freshness {
                ttl: Duration::from_secs(config.ttl_secs),
                stale_max_age: Duration::from_secs(config.stale_max_age_secs),
            },
            max_entries: config.max_entries.max(1),
            clock,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    /// Look up `key`. Entries past the stale window are dropped and reported as a miss.
    pub fn get(&self, key: &str) -> CacheLookup<V> {
        let now = self.clock.now();
        let (value, age, generation) = match self.inner.get(key) {
            Some(entry) => (entry.value.clone(), entry.age(now), entry.generation),
            None => return CacheLookup::Miss,
        };

        match self.freshness.classify(age) {
            Staleness::Fresh => CacheLookup::Fresh { value, age },
            Staleness::Stale => CacheLookup::Stale { value, age },
            Staleness::Expired => {
                // Only drop the entry we saw; a concurrent put may have replaced it.
                self.inner.remove_if(key, |_, entry| entry.generation == generation);
                tracing::debug!(key, age_secs = age.as_secs(), "Evicted expired cache entry");
                CacheLookup::Miss
            }
        }
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        if !self.inner.contains_key(&key) && self.inner.len() >= self.max_entries {
            self.make_room();
        }
        let entry = CacheEntry {
            value,
            fetched_at: self.clock.now(),
            generation: self.generation.fetch_add(1, Ordering::Relaxed),
        };
        self.inner.insert(key, entry);
    }

    fn make_room(&self) {
        let purged = self.purge_expired();
        if purged > 0 && self.inner.len() < self.max_entries {
            return;
        }

        let oldest = self
            .inner
            .iter()
            .min_by_key(|entry| (entry.fetched_at, entry.generation))
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.inner.remove(&key);
            tracing::debug!(key = %key, "Cache full, evicted oldest entry");
        }
    }

    /// Drop every entry past the stale window. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let stale_max_age = self.freshness.stale_max_age;
        let before = self.inner.len();
        self.inner
            .retain(|_, entry| entry.age(now) < stale_max_age);
        before.saturating_sub(self.inner.len())
    }

    /// Timestamp of the entry under `key`, regardless of freshness.
    pub fn fetched_at(&self, key: &str) -> Option<Instant> {
        self.inner.get(key).map(|entry| entry.fetched_at)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;

    fn store() -> (CacheStore<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (CacheStore::with_clock(&CacheConfig::default(), clock.clone()), clock)
    }

    #[test]
    fn test_fresh_then_stale_then_miss() {
        let (cache, clock) = store();
        cache.put("weather:london", "rain".to_string());

        clock.advance(Duration::from_secs(10));
        assert_eq!(
            cache.get("weather:london"),
            CacheLookup::Fresh { value: "rain".to_string(), age: Duration::from_secs(10) }
        );

        clock.advance(Duration::from_secs(1790));
        assert_eq!(
            cache.get("weather:london"),
            CacheLookup::Stale { value: "rain".to_string(), age: Duration::from_secs(1800) }
        );

        clock.advance(Duration::from_secs(1800));
        assert!(cache.get("weather:london").is_miss());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_key_is_miss() {
        let (cache, _) = store();
        assert_eq!(cache.get("weather:nowhere"), CacheLookup::Miss);
    }

    #[test]
    fn test_put_replaces_stale_entry() {
        let (cache, clock) = store();
        cache.put("weather:paris", "old".to_string());
        clock.advance(Duration::from_secs(600));
        assert!(!cache.get("weather:paris").is_fresh());

        cache.put("weather:paris", "new".to_string());
        match cache.get("weather:paris") {
            CacheLookup::Fresh { value, age } => {
                assert_eq!(value, "new");
                assert_eq!(age, Duration::ZERO);
            }
            other => panic!("expected fresh entry, got {other:?}"),
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_full_store_evicts_oldest() {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig { max_entries: 2, ..CacheConfig::default() };
        let cache = CacheStore::with_clock(&config, clock.clone());

        cache.put("a", 1);
        clock.advance(Duration::from_secs(1));
        cache.put("b", 2);
        clock.advance(Duration::from_secs(1));
        cache.put("c", 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_miss());
        assert!(cache.get("b").is_fresh());
        assert!(cache.get("c").is_fresh());
    }

    #[test]
    fn test_full_store_prefers_purging_expired() {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig { max_entries: 2, ..CacheConfig::default() };
        let cache = CacheStore::with_clock(&config, clock.clone());

        cache.put("expired", 1);
        clock.advance(Duration::from_secs(3000));
        cache.put("kept", 2);
        clock.advance(Duration::from_secs(700));
        cache.put("new", 3);

        assert!(cache.fetched_at("expired").is_none());
        assert!(cache.fetched_at("kept").is_some());
        assert!(cache.fetched_at("new").is_some());
    }

    #[test]
    fn test_purge_expired_counts_removed() {
        let (cache, clock) = store();
        cache.put("a", "1".to_string());
        clock.advance(Duration::from_secs(3600));
        cache.put("b", "2".to_string());
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_puts_keep_one_entry_per_key() {
        let (cache, _) = store();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for n in 0..50 {
                        cache.put("weather:shared", format!("{i}-{n}"));
                        let _ = cache.get("weather:shared");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.get("weather:shared").is_fresh());
    }
}
