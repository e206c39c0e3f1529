use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde_json::Value;

use crate::config::LookupCacheConfig;

struct Entry {
    values: Vec<Value>,
    stored_at: Instant,
}

/// LRU cache of lookup results with a per-entry time to live.
///
/// Thread-safe via internal mutex; concurrent writers for the same key
/// simply overwrite each other.
pub struct LookupCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl LookupCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn from_config(config: &LookupCacheConfig) -> Self {
        Self::new(config.capacity, Duration::from_secs(config.ttl_secs))
    }

    /// Cached values for `key`, unless missing or expired.
    pub fn get(&self, key: &str) -> Option<Vec<Value>> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => return Some(entry.values.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    pub fn put(&self, key: String, values: Vec<Value>) {
        self.lock().put(
            key,
            Entry {
                values,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave an entry half-written.
    fn lock(&self) -> MutexGuard<'_, LruCache<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hit_within_ttl() {
        let cache = LookupCache::new(4, Duration::from_secs(60));
        cache.put("field:x".into(), vec![json!({"value": "A"})]);
        assert_eq!(cache.get("field:x"), Some(vec![json!({"value": "A"})]));
        assert_eq!(cache.get("field:y"), None);
    }

    #[test]
    fn expired_entries_are_evicted() {
        let cache = LookupCache::new(4, Duration::ZERO);
        cache.put("field:x".into(), vec![json!(1)]);
        assert_eq!(cache.get("field:x"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn least_recently_used_is_dropped_at_capacity() {
        let cache = LookupCache::new(2, Duration::from_secs(60));
        cache.put("a".into(), vec![json!(1)]);
        cache.put("b".into(), vec![json!(2)]);
        cache.get("a");
        cache.put("c".into(), vec![json!(3)]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn last_write_wins() {
        let cache = LookupCache::new(2, Duration::from_secs(60));
        cache.put("a".into(), vec![json!(1)]);
        cache.put("a".into(), vec![json!(2)]);
        assert_eq!(cache.get("a"), Some(vec![json!(2)]));
    }

    #[test]
    fn zero_capacity_still_holds_one_entry() {
        let cache = LookupCache::new(0, Duration::from_secs(60));
        cache.put("a".into(), vec![json!(1)]);
        assert_eq!(cache.len(), 1);
    }
}
