//! Bounded working-set cache with least-recently-used eviction.
//!
//! The cache only bounds memory: evicting an entry never touches durable
//! state, which lives in [`crate::store::CommittedStore`]. `put` reports the
//! entry it displaced so callers can observe eviction if they care.

use coffer_core::Value;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// A fixed-capacity LRU cache over key/value pairs.
///
/// All methods take `&self`; the cache is safe to share by reference across
/// threads.
pub struct EvictionCache {
    inner: Mutex<LruCache<String, Value>>,
}

impl EvictionCache {
    /// Create a cache holding at most `capacity` entries. A capacity of zero
    /// is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        EvictionCache {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a key, promoting it to most-recently-used on a hit.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().get(key).cloned()
    }

    /// Look up a key without touching recency order.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.inner.lock().peek(key).cloned()
    }

    /// Insert or replace an entry.
    ///
    /// Returns the entry evicted to make room, if the cache was at capacity.
    /// Replacing an existing key is not an eviction and returns `None`.
    pub fn put(&self, key: String, value: Value) -> Option<(String, Value)> {
        let displaced = self.inner.lock().push(key.clone(), value);
        match displaced {
            Some((old_key, _)) if old_key == key => None,
            other => other,
        }
    }

    /// Remove an entry, returning it if present.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.lock().pop(key)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Snapshot of the live entries, most-recently-used first.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_promotes_recency() {
        let cache = EvictionCache::new(2);
        cache.put("a".into(), Value::integer(1, 1));
        cache.put("b".into(), Value::integer(1, 2));

        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.get("a").is_some());
        let evicted = cache.put("c".into(), Value::integer(1, 3));
        assert_eq!(evicted.map(|(k, _)| k), Some("b".to_string()));
        assert!(cache.get("a").is_some());
    }

    #[test]
    fn test_peek_does_not_promote() {
        let cache = EvictionCache::new(2);
        cache.put("a".into(), Value::integer(1, 1));
        cache.put("b".into(), Value::integer(1, 2));

        assert!(cache.peek("a").is_some());
        let evicted = cache.put("c".into(), Value::integer(1, 3));
        assert_eq!(evicted.map(|(k, _)| k), Some("a".to_string()));
    }

    #[test]
    fn test_replace_is_not_an_eviction() {
        let cache = EvictionCache::new(2);
        cache.put("a".into(), Value::integer(1, 1));
        cache.put("b".into(), Value::integer(1, 2));

        assert!(cache.put("a".into(), Value::integer(2, 10)).is_none());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").and_then(|v| v.as_integer()), Some(10));
    }

    #[test]
    fn test_remove() {
        let cache = EvictionCache::new(2);
        cache.put("a".into(), Value::string(1, "x"));
        assert!(cache.remove("a").is_some());
        assert!(cache.remove("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cache = EvictionCache::new(0);
        cache.put("a".into(), Value::integer(1, 1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entries_snapshot() {
        let cache = EvictionCache::new(3);
        cache.put("a".into(), Value::integer(1, 1));
        cache.put("b".into(), Value::integer(1, 2));
        let entries = cache.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "b"); // most recent first
    }
}
