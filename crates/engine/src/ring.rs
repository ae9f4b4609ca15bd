//! Consistent-hash ring.
//!
//! Each shard contributes `replicas` virtual nodes, hashed onto a `u64`
//! ring; a key routes to the shard owning the first virtual node at or after
//! the key's hash, wrapping around. Adding or removing one shard therefore
//! moves roughly `1/shard_count` of the keyspace instead of reshuffling
//! everything the way modulo placement would.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use xxhash_rust::xxh3::xxh3_64;

pub use coffer_core::ShardId;

/// Hash ring mapping keys to shards. Reads vastly outnumber topology
/// changes, so the ring sits behind a single-writer/multi-reader lock.
pub struct HashRing {
    ring: RwLock<BTreeMap<u64, ShardId>>,
    replicas: usize,
}

impl HashRing {
    /// An empty ring placing `replicas` virtual nodes per shard.
    pub fn new(replicas: usize) -> Self {
        HashRing {
            ring: RwLock::new(BTreeMap::new()),
            replicas: replicas.max(1),
        }
    }

    fn virtual_node_hash(shard: ShardId, replica: usize) -> u64 {
        xxh3_64(format!("{shard}:{replica}").as_bytes())
    }

    /// Place a shard's virtual nodes on the ring.
    pub fn add_shard(&self, shard: ShardId) {
        let mut ring = self.ring.write();
        for replica in 0..self.replicas {
            ring.insert(Self::virtual_node_hash(shard, replica), shard);
        }
    }

    /// Remove a shard's virtual nodes from the ring.
    pub fn remove_shard(&self, shard: ShardId) {
        let mut ring = self.ring.write();
        for replica in 0..self.replicas {
            ring.remove(&Self::virtual_node_hash(shard, replica));
        }
    }

    /// The shard owning `key`, or `None` on an empty ring.
    pub fn route(&self, key: &str) -> Option<ShardId> {
        let ring = self.ring.read();
        let hash = xxh3_64(key.as_bytes());
        ring.range(hash..)
            .next()
            .or_else(|| ring.iter().next())
            .map(|(_, shard)| *shard)
    }

    /// Whether the ring has no shards.
    pub fn is_empty(&self) -> bool {
        self.ring.read().is_empty()
    }
}
