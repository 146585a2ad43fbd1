//! TTL result cache for search responses.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

/// Time source seam so expiry is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, the production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock advanced by hand from tests.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

struct Entry {
    key: String,
    value: Value,
    stored_at: DateTime<Utc>,
}

/// Bounded TTL cache with insertion-order eviction. Capacity 0 disables
/// caching entirely.
pub struct SearchCache {
    entries: Mutex<VecDeque<Entry>>,
    ttl: chrono::Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SearchCache {
    pub fn new(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
            capacity,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        if self.capacity == 0 {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let now = self.clock.now();
        let entries = self.entries.lock().unwrap();
        let found = entries
            .iter()
            .find(|e| e.key == key && now - e.stored_at < self.ttl)
            .map(|e| e.value.clone());
        drop(entries);

        match found {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: String, value: Value) {
        if self.capacity == 0 {
            return;
        }
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| e.key != key && now - e.stored_at < self.ttl);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(Entry {
            key,
            value,
            stored_at: now,
        });
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap();
        let evicted = entries.len();
        entries.clear();
        debug!(evicted, "Search cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache_with_clock(ttl_secs: u64, capacity: usize) -> (SearchCache, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let cache = SearchCache::new(
            Duration::from_secs(ttl_secs),
            capacity,
            Arc::new(clock.clone()),
        );
        (cache, clock)
    }

    #[test]
    fn test_get_put_roundtrip() {
        let (cache, _) = cache_with_clock(300, 10);
        assert!(cache.get("k").is_none());

        cache.put("k".to_string(), json!({"total": 3}));
        assert_eq!(cache.get("k").unwrap()["total"], 3);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let (cache, clock) = cache_with_clock(300, 10);
        cache.put("k".to_string(), json!(1));

        clock.advance(Duration::from_secs(299));
        assert!(cache.get("k").is_some());

        clock.advance(Duration::from_secs(2));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let (cache, _) = cache_with_clock(300, 2);
        cache.put("a".to_string(), json!(1));
        cache.put("b".to_string(), json!(2));
        cache.put("c".to_string(), json!(3));

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_put_replaces_existing_key() {
        let (cache, _) = cache_with_clock(300, 2);
        cache.put("a".to_string(), json!(1));
        cache.put("a".to_string(), json!(2));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap(), json!(2));
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let (cache, _) = cache_with_clock(300, 0);
        cache.put("a".to_string(), json!(1));
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_empties_cache() {
        let (cache, _) = cache_with_clock(300, 10);
        cache.put("a".to_string(), json!(1));
        cache.put("b".to_string(), json!(2));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }
}
