//! Bounded cache of small, fully fetched result sets.
//!
//! Keys are `QuerySpec::cache_key` hashes (DSN + statement + parameters).
//! Entries are evicted least-recently-used past `capacity` and, when a TTL is
//! set, expire that long after insertion. A capacity of 0 disables caching.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rowstream_core::config::StreamConfig;
use rowstream_core::hash::Hash256;
use rowstream_core::types::Row;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

struct Entry {
    rows: Arc<Vec<Row>>,
    inserted: Instant,
    last_used: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Hash256, Entry>,
    tick: u64,
    stats: CacheStats,
}

pub struct QueryCache {
    capacity: usize,
    ttl: Option<Duration>,
    inner: Mutex<Inner>,
}

impl QueryCache {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            capacity,
            ttl,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn from_config(cfg: &StreamConfig) -> Self {
        Self::new(cfg.cache_capacity, cfg.cache_ttl_ms.map(Duration::from_millis))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn get(&self, key: &Hash256) -> Option<Arc<Vec<Row>>> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&self, key: Hash256, rows: Vec<Row>) -> Arc<Vec<Row>> {
        self.insert_at(key, rows, Instant::now())
    }

    fn get_at(&self, key: &Hash256, now: Instant) -> Option<Arc<Vec<Row>>> {
        if !self.is_enabled() {
            return None;
        }
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.tick += 1;
        let tick = inner.tick;

        let expired = match inner.entries.get_mut(key) {
            None => {
                inner.stats.misses += 1;
                return None;
            }
            Some(entry) if !self.is_expired(entry, now) => {
                entry.last_used = tick;
                let rows = Arc::clone(&entry.rows);
                inner.stats.hits += 1;
                return Some(rows);
            }
            Some(_) => true,
        };
        if expired {
            inner.entries.remove(key);
            inner.stats.expirations += 1;
            inner.stats.misses += 1;
        }
        None
    }

    fn insert_at(&self, key: Hash256, rows: Vec<Row>, now: Instant) -> Arc<Vec<Row>> {
        let rows = Arc::new(rows);
        if !self.is_enabled() {
            return rows;
        }
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.tick += 1;
        let tick = inner.tick;
        inner.entries.insert(
            key,
            Entry {
                rows: Arc::clone(&rows),
                inserted: now,
                last_used: tick,
            },
        );
        while inner.entries.len() > self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| *k);
            match oldest {
                Some(k) => {
                    inner.entries.remove(&k);
                    inner.stats.evictions += 1;
                }
                None => break,
            }
        }
        rows
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(entry.inserted) >= ttl)
    }

    /// Cached rows stay valid even if a holder panicked mid-update.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowstream_core::hash::hash_str;

    #[test]
    fn test_lru_eviction_respects_recent_use() {
        let cache = QueryCache::new(2, None);
        let (a, b, c) = (hash_str("a"), hash_str("b"), hash_str("c"));
        cache.insert(a, Vec::new());
        cache.insert(b, Vec::new());
        assert!(cache.get(&a).is_some());
        cache.insert(c, Vec::new());

        assert!(cache.get(&a).is_some());
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&c).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = QueryCache::new(4, Some(Duration::from_millis(100)));
        let key = hash_str("select");
        let t0 = Instant::now();
        cache.insert_at(key, Vec::new(), t0);

        assert!(cache.get_at(&key, t0 + Duration::from_millis(50)).is_some());
        assert!(cache.get_at(&key, t0 + Duration::from_millis(150)).is_none());
        assert!(cache.is_empty());
        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let cache = QueryCache::new(0, None);
        let key = hash_str("q");
        cache.insert(key, Vec::new());
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.len(), 0);
    }
}
