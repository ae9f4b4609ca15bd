//! Engine configuration.

use crate::ring::ShardId;
use coffer_storage::EncryptionConfig;
use std::path::{Path, PathBuf};

/// Tunables for a [`crate::ShardedStore`].
#[derive(Clone)]
pub struct StoreConfig {
    /// Directory holding every shard's snapshot, WAL, and the shared
    /// transaction-id checkpoint.
    pub data_dir: PathBuf,
    /// Shards created at open.
    pub shard_count: usize,
    /// Per-shard working-set cache capacity, in entries.
    pub cache_capacity: usize,
    /// Virtual nodes per shard on the hash ring.
    pub ring_replicas: usize,
    /// At-rest encryption for snapshot files.
    pub encryption: EncryptionConfig,
}

impl StoreConfig {
    /// Defaults rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        StoreConfig {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the number of shards created at open.
    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count.max(1);
        self
    }

    /// Set the per-shard cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the virtual-node count per shard.
    pub fn with_ring_replicas(mut self, replicas: usize) -> Self {
        self.ring_replicas = replicas.max(1);
        self
    }

    /// Set the snapshot encryption settings.
    pub fn with_encryption(mut self, encryption: EncryptionConfig) -> Self {
        self.encryption = encryption;
        self
    }

    /// Path of one shard's snapshot file.
    pub fn snapshot_path(&self, shard: ShardId) -> PathBuf {
        self.data_dir.join(format!("shard-{shard}.snap"))
    }

    /// Path of one shard's write-ahead log.
    pub fn wal_path(&self, shard: ShardId) -> PathBuf {
        self.data_dir.join(format!("shard-{shard}.wal"))
    }

    /// Path of the shared transaction-id checkpoint.
    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join("txn-id.checkpoint")
    }

    /// The configured data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            data_dir: PathBuf::from("coffer-data"),
            shard_count: 4,
            cache_capacity: 1024,
            ring_replicas: 100,
            encryption: EncryptionConfig::disabled(),
        }
    }
}
