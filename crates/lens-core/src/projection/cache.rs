//! LRU cache with per-entry expiry for computed views.
//!
//! # Thread Safety
//!
//! All methods take `&mut self`. `ViewService` wraps the cache in a
//! `parking_lot::Mutex`; do not share it across threads otherwise.
//!
//! Time comes from `tokio::time::Instant`, so tests can drive expiry with a
//! paused clock.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::CacheConfig;

/// Cache statistics for monitoring effectiveness.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Live entries only.
    pub size: usize,
    pub max_size: usize,
    pub hit_rate: f64,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    access_order: u64,
}

/// Bounded cache evicting the least recently used entry at capacity.
///
/// Recency is a strictly increasing counter; `recency` maps each counter
/// value back to its key so the oldest entry is found without a scan.
#[derive(Debug)]
pub struct ViewCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    recency: BTreeMap<u64, String>,
    max_size: usize,
    default_ttl: Duration,
    counter: u64,
    hits: u64,
    misses: u64,
}

impl<V: Clone> ViewCache<V> {
    /// A zero `max_size` is treated as 1.
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            max_size: max_size.max(1),
            default_ttl,
            counter: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_size, config.ttl())
    }

    fn next_order(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.access_order);
        Some(entry)
    }

    /// Live value for `key`, refreshing its recency. Expired entries are
    /// evicted and count as a miss.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            None => {
                self.misses += 1;
                return None;
            }
            Some(entry) => now >= entry.expires_at,
        };
        if expired {
            self.remove_entry(key);
            self.misses += 1;
            return None;
        }

        let order = self.next_order();
        let entry = self.entries.get_mut(key)?;
        let previous = std::mem::replace(&mut entry.access_order, order);
        let value = entry.value.clone();
        self.recency.remove(&previous);
        let stale = self.recency.insert(order, key.to_string());
        debug_assert!(stale.is_none(), "recency counter reused");

        self.hits += 1;
        Some(value)
    }

    /// Insert or overwrite. `ttl` overrides the default lifetime.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);

        if self.remove_entry(&key).is_none() && self.entries.len() >= self.max_size {
            self.evict_lru();
        }

        let access_order = self.next_order();
        let stale = self.recency.insert(access_order, key.clone());
        debug_assert!(stale.is_none(), "recency counter reused");
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at,
                access_order,
            },
        );
    }

    fn evict_lru(&mut self) {
        if let Some((_, key)) = self.recency.pop_first() {
            self.entries.remove(&key);
        }
    }

    /// Remove `key`; returns whether it was present.
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.remove_entry(key).is_some()
    }

    /// Drop every entry and reset hit/miss counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.hits = 0;
        self.misses = 0;
    }

    fn sweep_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| now >= e.expires_at)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            self.remove_entry(&key);
        }
    }

    /// Statistics after evicting expired entries.
    pub fn stats(&mut self) -> CacheStats {
        self.sweep_expired();
        let total = self.hits + self.misses;
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.entries.len(),
            max_size: self.max_size,
            hit_rate: if total == 0 {
                0.0
            } else {
                self.hits as f64 / total as f64
            },
        }
    }

    /// Stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_lru_eviction_order() {
        let mut cache: ViewCache<i32> = ViewCache::new(3, MINUTE);
        cache.set("key1", 1, None);
        cache.set("key2", 2, None);
        cache.set("key3", 3, None);
        assert_eq!(cache.get("key1"), Some(1));

        cache.set("key4", 4, None);
        assert_eq!(cache.get("key2"), None);
        assert_eq!(cache.get("key1"), Some(1));
        assert_eq!(cache.get("key3"), Some(3));
        assert_eq!(cache.get("key4"), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let mut cache: ViewCache<&str> = ViewCache::new(4, MINUTE);
        cache.set("k", "v", Some(Duration::from_millis(500)));

        tokio::time::advance(Duration::from_millis(499)).await;
        assert_eq!(cache.get("k"), Some("v"));

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_keeps_occupancy() {
        let mut cache: ViewCache<i32> = ViewCache::new(2, MINUTE);
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.set("a", 10, None);
        assert_eq!(cache.len(), 2);

        // "b" is now the least recent
        cache.set("c", 3, None);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_sweep_and_clear() {
        let mut cache: ViewCache<i32> = ViewCache::new(4, Duration::from_millis(100));
        cache.set("short", 1, None);
        cache.set("long", 2, Some(MINUTE));
        cache.get("long");
        cache.get("missing");

        tokio::time::advance(Duration::from_millis(150)).await;
        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.5);

        cache.clear();
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (0, 0, 0));
    }
}
