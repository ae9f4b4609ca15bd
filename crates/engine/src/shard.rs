//! One shard: an independently durable slice of the store.
//!
//! A shard wires the snapshot file, the WAL, the committed store, and the
//! transaction manager together, and maintains the two secondary indexes the
//! search paths use: the full key index and the numeric index over integer
//! values. Opening a shard runs crash recovery, then rewrites the snapshot
//! and truncates the log so the next start replays nothing.

use crate::config::StoreConfig;
use crate::ring::ShardId;
use coffer_core::{Query, Result, SessionId, Value};
use coffer_concurrency::{TransactionManager, TxnIdAllocator};
use coffer_storage::{recover, CommittedStore, SnapshotFile, Wal};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tracing::info;

/// A single shard of the store.
pub struct Shard {
    id: ShardId,
    store: Arc<CommittedStore>,
    snapshot: SnapshotFile,
    wal: Arc<Wal>,
    manager: TransactionManager,
    key_index: DashMap<String, ()>,
    value_index: DashMap<String, i64>,
}

impl Shard {
    /// Open the shard's files under the configured data directory, running
    /// recovery and rebuilding the indexes.
    pub fn open(id: ShardId, config: &StoreConfig, allocator: Arc<TxnIdAllocator>) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let snapshot = SnapshotFile::new(config.snapshot_path(id), config.encryption.clone());
        let wal = Arc::new(Wal::open(config.wal_path(id))?);
        let store = Arc::new(CommittedStore::new(config.cache_capacity));

        let report = recover(&snapshot, &wal, &store)?;
        allocator.reseed(report.max_txn_id);
        // Fold the replayed transactions into the snapshot so the log never
        // replays twice.
        snapshot.save(&store.entries())?;
        wal.truncate()?;

        let shard = Shard {
            id,
            manager: TransactionManager::new(Arc::clone(&store), Arc::clone(&wal), allocator),
            store,
            snapshot,
            wal,
            key_index: DashMap::new(),
            value_index: DashMap::new(),
        };
        for (key, value) in shard.store.entries() {
            shard.index(&key, &value);
        }
        info!(shard = %shard.id, entries = shard.store.len(), "shard opened");
        Ok(shard)
    }

    /// This shard's id.
    pub fn id(&self) -> ShardId {
        self.id
    }

    fn index(&self, key: &str, value: &Value) {
        self.key_index.insert(key.to_string(), ());
        match value.as_integer() {
            Some(i) => {
                self.value_index.insert(key.to_string(), i);
            }
            None => {
                self.value_index.remove(key);
            }
        }
    }

    fn unindex(&self, key: &str) {
        self.key_index.remove(key);
        self.value_index.remove(key);
    }

    /// Re-derive a key's index entries from committed state.
    fn reindex(&self, key: &str) {
        match self.store.get(key) {
            Some(value) => self.index(key, &value),
            None => self.unindex(key),
        }
    }

    /// Start a transaction for the session.
    pub fn begin(&self, session: SessionId) -> Result<u64> {
        self.manager.begin(session)
    }

    /// Whether the session holds an active transaction on this shard.
    pub fn is_transaction_active(&self, session: SessionId) -> bool {
        self.manager.is_active(session)
    }

    /// Stage a write and index it in the same call.
    pub fn put(&self, session: SessionId, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        self.manager
            .with_active(session, |txn| txn.put(key.clone(), value.clone()))??;
        self.index(&key, &value);
        Ok(())
    }

    /// Read through the session's transaction.
    pub fn get(&self, session: SessionId, key: &str) -> Result<Option<Value>> {
        self.manager.with_active(session, |txn| txn.get(key))
    }

    /// Stage a removal and drop its index entries in the same call.
    pub fn delete(&self, session: SessionId, key: &str) -> Result<bool> {
        let deleted = self.manager.with_active(session, |txn| txn.delete(key))??;
        if deleted {
            self.unindex(key);
        }
        Ok(deleted)
    }

    /// Commit the session's transaction, then make the new committed state
    /// durable: snapshot rewrite followed by WAL truncation.
    ///
    /// Index entries for the touched keys are re-derived from committed
    /// state whatever the outcome, so a conflicting commit does not leave
    /// staged keys behind in the indexes.
    pub fn commit(&self, session: SessionId) -> Result<()> {
        let touched = self.manager.with_active(session, |txn| txn.touched_keys())?;
        let outcome = self.manager.commit(session);
        for key in &touched {
            self.reindex(key);
        }
        outcome?;
        self.snapshot.save(&self.store.entries())?;
        self.wal.truncate()?;
        Ok(())
    }

    /// Roll back the session's transaction and restore index entries for
    /// the keys it touched.
    pub fn rollback(&self, session: SessionId) -> Result<()> {
        let touched = self.manager.with_active(session, |txn| txn.touched_keys())?;
        let outcome = self.manager.rollback(session);
        for key in &touched {
            self.reindex(key);
        }
        outcome
    }

    /// Clone of the session's staged writes.
    pub fn staged_state(&self, session: SessionId) -> Result<HashMap<String, Value>> {
        self.manager.staged_state(session)
    }

    /// Snapshot of this shard's committed entries.
    pub fn committed_state(&self) -> HashMap<String, Value> {
        self.store.entries().into_iter().collect()
    }

    /// Search committed entries only.
    pub fn search_committed(&self, query: &Query) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        // Range-only queries can walk the numeric index instead of every key.
        if query.pattern().is_none() && query.kind_filter().is_none() && query.has_range() {
            for entry in self.value_index.iter() {
                if query.in_range(*entry.value()) {
                    if let Some(value) = self.store.get(entry.key()) {
                        out.push((entry.key().clone(), value));
                    }
                }
            }
            return out;
        }
        for entry in self.key_index.iter() {
            if let Some(value) = self.store.get(entry.key()) {
                if query.matches(entry.key(), &value) {
                    out.push((entry.key().clone(), value));
                }
            }
        }
        out
    }

    /// Search the session's staged writes only. Fails without an active
    /// transaction.
    pub fn search_staged(&self, session: SessionId, query: &Query) -> Result<Vec<(String, Value)>> {
        self.manager.with_active(session, |txn| {
            txn.staged_puts()
                .iter()
                .filter(|(key, value)| query.matches(key, value))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
    }

    /// Search committed entries overlaid by the session's staged writes.
    /// Staged puts win over committed values; staged deletes hide them.
    pub fn search(&self, session: SessionId, query: &Query) -> Result<Vec<(String, Value)>> {
        let (staged, touched) = self
            .manager
            .with_active(session, |txn| (txn.staged_state(), txn.touched_keys()))?;

        let mut out: Vec<(String, Value)> = self
            .search_committed(query)
            .into_iter()
            .filter(|(key, _)| !touched.contains(key))
            .collect();
        for (key, value) in staged {
            if query.matches(&key, &value) {
                out.push((key, value));
            }
        }
        Ok(out)
    }

    /// Swap the at-rest encryption used by subsequent snapshot writes.
    pub fn set_encryption(&self, config: coffer_storage::EncryptionConfig) {
        self.snapshot.set_encryption(config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_core::QueryBuilder;
    use tempfile::tempdir;

    fn open_shard(dir: &std::path::Path) -> Shard {
        let config = StoreConfig::new(dir).with_cache_capacity(8);
        let allocator = Arc::new(TxnIdAllocator::open(config.checkpoint_path()).unwrap());
        Shard::open(ShardId(0), &config, allocator).unwrap()
    }

    fn query(pattern: &str) -> Query {
        QueryBuilder::default().with_pattern(pattern).build().unwrap()
    }

    #[test]
    fn test_put_commit_get_cycle() {
        let dir = tempdir().unwrap();
        let shard = open_shard(dir.path());
        let session = SessionId(1);

        shard.begin(session).unwrap();
        shard.put(session, "age", Value::integer(0, 25)).unwrap();
        shard.commit(session).unwrap();

        shard.begin(session).unwrap();
        let v = shard.get(session, "age").unwrap().unwrap();
        assert_eq!(v.version(), 1);
        assert_eq!(v.as_integer(), Some(25));
    }

    #[test]
    fn test_committed_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let session = SessionId(1);
        {
            let shard = open_shard(dir.path());
            shard.begin(session).unwrap();
            shard.put(session, "k", Value::string(0, "v")).unwrap();
            shard.commit(session).unwrap();
        }
        let shard = open_shard(dir.path());
        let committed = shard.committed_state();
        assert_eq!(committed["k"].as_str(), Some("v"));
        // And the rebuilt index can find it
        assert_eq!(shard.search_committed(&query("^k$")).len(), 1);
    }

    #[test]
    fn test_uncommitted_work_gone_after_reopen() {
        let dir = tempdir().unwrap();
        let session = SessionId(1);
        {
            let shard = open_shard(dir.path());
            shard.begin(session).unwrap();
            shard.put(session, "ghost", Value::string(0, "v")).unwrap();
            // Crash: no commit
        }
        let shard = open_shard(dir.path());
        assert!(shard.committed_state().is_empty());
    }

    #[test]
    fn test_staged_search_requires_transaction() {
        let dir = tempdir().unwrap();
        let shard = open_shard(dir.path());
        assert!(shard.search_staged(SessionId(1), &query("x")).is_err());
    }

    #[test]
    fn test_search_overlays_staged_over_committed() {
        let dir = tempdir().unwrap();
        let shard = open_shard(dir.path());
        let session = SessionId(1);

        shard.begin(session).unwrap();
        shard.put(session, "user:1", Value::string(0, "alice")).unwrap();
        shard.put(session, "user:2", Value::string(0, "bob")).unwrap();
        shard.commit(session).unwrap();

        shard.begin(session).unwrap();
        shard.put(session, "user:2", Value::string(0, "carol")).unwrap();
        shard.delete(session, "user:1").unwrap();

        let results = shard.search(session, &query("^user:")).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1.as_str(), Some("carol"));

        // Committed view is unaffected by staging
        let committed = shard.search_committed(&query("^user:"));
        assert_eq!(committed.len(), 2);
    }

    #[test]
    fn test_range_search_uses_numeric_index() {
        let dir = tempdir().unwrap();
        let shard = open_shard(dir.path());
        let session = SessionId(1);

        shard.begin(session).unwrap();
        shard.put(session, "a", Value::integer(0, 5)).unwrap();
        shard.put(session, "b", Value::integer(0, 15)).unwrap();
        shard.put(session, "c", Value::string(0, "10")).unwrap();
        shard.commit(session).unwrap();

        let q = QueryBuilder::default().with_range(Some(10), Some(20)).build().unwrap();
        let results = shard.search_committed(&q);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "b");
    }

    #[test]
    fn test_rollback_restores_indexes() {
        let dir = tempdir().unwrap();
        let shard = open_shard(dir.path());
        let session = SessionId(1);

        shard.begin(session).unwrap();
        shard.put(session, "keep", Value::integer(0, 1)).unwrap();
        shard.commit(session).unwrap();

        shard.begin(session).unwrap();
        shard.delete(session, "keep").unwrap();
        shard.rollback(session).unwrap();

        assert_eq!(shard.search_committed(&query("^keep$")).len(), 1);
    }

    #[test]
    fn test_conflicting_commit_does_not_poison_indexes() {
        let dir = tempdir().unwrap();
        let shard = open_shard(dir.path());
        let (a, b) = (SessionId(1), SessionId(2));

        shard.begin(a).unwrap();
        shard.put(a, "k", Value::integer(0, 1)).unwrap();
        shard.commit(a).unwrap();

        shard.begin(a).unwrap();
        shard.begin(b).unwrap();
        shard.get(a, "k").unwrap();
        shard.get(b, "k").unwrap();
        shard.put(a, "k", Value::integer(0, 2)).unwrap();
        shard.put(b, "k", Value::integer(0, 3)).unwrap();

        shard.commit(a).unwrap();
        assert!(shard.commit(b).is_err());

        let results = shard.search_committed(&query("^k$"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1.as_integer(), Some(2));
    }
}
