//! The sharded store: the engine surface the embedding application drives.
//!
//! Point operations route each key to exactly one shard through the hash
//! ring; transaction control and search fan out to every shard. Fan-out
//! commit is not atomic across shards: each shard commits or conflicts on
//! its own, so a conflict on a later shard leaves earlier shards committed.
//! That is a known limitation of the design, surfaced to the caller as the
//! error from the first failing shard.

use crate::config::StoreConfig;
use crate::ring::{HashRing, ShardId};
use crate::shard::Shard;
use coffer_core::{Error, Query, Result, SessionId, Value};
use coffer_concurrency::TxnIdAllocator;
use coffer_storage::EncryptionConfig;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tracing::info;

/// A store spread over consistent-hashed shards.
pub struct ShardedStore {
    shards: DashMap<ShardId, Arc<Shard>>,
    ring: HashRing,
    allocator: Arc<TxnIdAllocator>,
    config: StoreConfig,
}

impl ShardedStore {
    /// Open (or create) the store described by `config`.
    pub fn open(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let allocator = Arc::new(TxnIdAllocator::open(config.checkpoint_path())?);
        let store = ShardedStore {
            shards: DashMap::new(),
            ring: HashRing::new(config.ring_replicas),
            allocator,
            config,
        };
        for id in 0..store.config.shard_count as u32 {
            store.open_shard(ShardId(id))?;
        }
        info!(shards = store.shards.len(), "store opened");
        Ok(store)
    }

    fn open_shard(&self, id: ShardId) -> Result<()> {
        let shard = Arc::new(Shard::open(id, &self.config, Arc::clone(&self.allocator))?);
        self.shards.insert(id, shard);
        self.ring.add_shard(id);
        Ok(())
    }

    /// Shards currently serving keys.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// The shard a key routes to.
    pub fn route(&self, key: &str) -> Option<ShardId> {
        self.ring.route(key)
    }

    fn shard_for(&self, key: &str) -> Result<Arc<Shard>> {
        let id = self.ring.route(key).ok_or(Error::NoShards)?;
        self.shard(id)
    }

    fn shard(&self, id: ShardId) -> Result<Arc<Shard>> {
        self.shards
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(Error::ShardUnavailable(id))
    }

    /// Shards in id order, for deterministic fan-out.
    fn shards_ordered(&self) -> Vec<Arc<Shard>> {
        let mut shards: Vec<_> = self
            .shards
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        shards.sort_by_key(|(id, _)| *id);
        shards.into_iter().map(|(_, shard)| shard).collect()
    }

    /// Begin a transaction for the session on every shard.
    pub fn begin_transaction(&self, session: SessionId) -> Result<()> {
        for shard in self.shards_ordered() {
            shard.begin(session)?;
        }
        Ok(())
    }

    /// Whether every shard holds an active transaction for the session.
    pub fn is_transaction_active(&self, session: SessionId) -> bool {
        !self.shards.is_empty()
            && self
                .shards
                .iter()
                .all(|entry| entry.value().is_transaction_active(session))
    }

    /// Stage a write on the key's shard.
    pub fn put(&self, session: SessionId, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        self.shard_for(&key)?.put(session, key, value)
    }

    /// Read a key through the session's transaction on its shard.
    pub fn get(&self, session: SessionId, key: &str) -> Result<Option<Value>> {
        self.shard_for(key)?.get(session, key)
    }

    /// Stage a removal on the key's shard.
    pub fn delete(&self, session: SessionId, key: &str) -> Result<bool> {
        self.shard_for(key)?.delete(session, key)
    }

    /// Commit the session's transaction on every shard, in shard-id order.
    ///
    /// Not atomic across shards: shards before the first failure stay
    /// committed.
    pub fn commit(&self, session: SessionId) -> Result<()> {
        for shard in self.shards_ordered() {
            shard.commit(session)?;
        }
        Ok(())
    }

    /// Roll back the session's transaction on every shard.
    pub fn rollback(&self, session: SessionId) -> Result<()> {
        for shard in self.shards_ordered() {
            shard.rollback(session)?;
        }
        Ok(())
    }

    /// The session's staged writes across all shards.
    pub fn staged_state(&self, session: SessionId) -> Result<HashMap<String, Value>> {
        let mut out = HashMap::new();
        for shard in self.shards_ordered() {
            out.extend(shard.staged_state(session)?);
        }
        Ok(out)
    }

    /// Every committed entry across all shards.
    pub fn committed_state(&self) -> HashMap<String, Value> {
        let mut out = HashMap::new();
        for shard in self.shards_ordered() {
            out.extend(shard.committed_state());
        }
        out
    }

    /// Search committed entries across all shards.
    pub fn search_committed(&self, query: &Query) -> Vec<(String, Value)> {
        self.shards_ordered()
            .iter()
            .flat_map(|shard| shard.search_committed(query))
            .collect()
    }

    /// Search the session's staged writes across all shards.
    pub fn search_staged(&self, session: SessionId, query: &Query) -> Result<Vec<(String, Value)>> {
        let mut out = Vec::new();
        for shard in self.shards_ordered() {
            out.extend(shard.search_staged(session, query)?);
        }
        Ok(out)
    }

    /// Search committed entries overlaid by the session's staged writes.
    pub fn search(&self, session: SessionId, query: &Query) -> Result<Vec<(String, Value)>> {
        let mut out = Vec::new();
        for shard in self.shards_ordered() {
            out.extend(shard.search(session, query)?);
        }
        Ok(out)
    }

    /// Bring one more shard online and place it on the ring. Keys that now
    /// route to it are served from its (initially empty) state; previously
    /// committed entries stay on the shard that owned them.
    pub fn add_shard(&self) -> Result<ShardId> {
        let next = self
            .shards
            .iter()
            .map(|entry| entry.key().0)
            .max()
            .map_or(0, |max| max + 1);
        let id = ShardId(next);
        self.open_shard(id)?;
        info!(shard = %id, "shard added");
        Ok(id)
    }

    /// Take a shard off the ring. Its files stay on disk; its keys route to
    /// the surviving shards.
    pub fn remove_shard(&self, id: ShardId) -> Result<()> {
        let (_, _shard) = self
            .shards
            .remove(&id)
            .ok_or(Error::ShardUnavailable(id))?;
        self.ring.remove_shard(id);
        info!(shard = %id, "shard removed");
        Ok(())
    }

    /// Swap the at-rest encryption used for every shard's snapshot writes.
    pub fn set_encryption(&self, config: EncryptionConfig) {
        for shard in self.shards_ordered() {
            shard.set_encryption(config.clone());
        }
    }
}
