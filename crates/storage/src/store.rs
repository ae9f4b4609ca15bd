//! Committed state: the full durable map fronted by the eviction cache.
//!
//! Snapshot writes and commit-time version checks must always see every
//! committed entry, so the full map is authoritative and the cache is a
//! read-through working set. Eviction only drops a cache entry; the map keeps
//! the committed value until it is deleted by a transaction.

use crate::cache::EvictionCache;
use coffer_core::Value;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;

/// All committed entries, plus a bounded cache over the hot subset.
pub struct CommittedStore {
    map: RwLock<HashMap<String, Value>>,
    cache: EvictionCache,
    commit_lock: Mutex<()>,
}

impl CommittedStore {
    /// Create an empty store with the given cache capacity.
    pub fn new(cache_capacity: usize) -> Self {
        CommittedStore {
            map: RwLock::new(HashMap::new()),
            cache: EvictionCache::new(cache_capacity),
            commit_lock: Mutex::new(()),
        }
    }

    /// Take the shard's commit lock.
    ///
    /// A committer must hold this across validation, logging, and apply so
    /// the committed versions it validated against cannot move underneath
    /// it. Reads and staging never take it.
    pub fn lock_commits(&self) -> MutexGuard<'_, ()> {
        self.commit_lock.lock()
    }

    /// Read a committed value, repopulating the cache on a miss.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.cache.get(key) {
            return Some(value);
        }
        let value = self.map.read().get(key).cloned()?;
        self.cache.put(key.to_string(), value.clone());
        Some(value)
    }

    /// The committed version of a key, without promoting it in the cache.
    ///
    /// This is the commit-time validation read; it must not perturb recency.
    pub fn version_of(&self, key: &str) -> Option<u64> {
        self.map.read().get(key).map(Value::version)
    }

    /// Install a committed value.
    pub fn apply_put(&self, key: String, value: Value) {
        self.map.write().insert(key.clone(), value.clone());
        self.cache.put(key, value);
    }

    /// Remove a committed value, returning it if present.
    pub fn apply_delete(&self, key: &str) -> Option<Value> {
        let removed = self.map.write().remove(key);
        self.cache.remove(key);
        removed
    }

    /// Whether a key is committed.
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.read().contains_key(key)
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Whether the store holds no committed entries.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Snapshot of every committed entry. This is what gets persisted, so it
    /// must include entries the cache has evicted.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.map
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
