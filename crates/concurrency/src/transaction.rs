//! A single transaction: staged writes plus optimistic validation state.
//!
//! Nothing is locked while a transaction is active. Reads record the version
//! they observed; commit compares those recorded versions against the
//! committed store and aborts on any mismatch. A key that was written but
//! never read is a blind write and does not participate in validation.

use coffer_core::{Error, Result, Value};
use coffer_storage::{CommittedStore, Wal, WalEntry};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// An in-flight transaction. Created through
/// [`crate::manager::TransactionManager::begin`]; consumed by commit or
/// rollback.
pub struct Transaction {
    txn_id: u64,
    staged_puts: HashMap<String, Value>,
    // key -> value visible when the delete was staged
    staged_deletes: HashMap<String, Value>,
    // key -> committed version observed on first read (None = absent)
    read_versions: HashMap<String, Option<u64>>,
    store: Arc<CommittedStore>,
    wal: Arc<Wal>,
}

impl Transaction {
    pub(crate) fn new(txn_id: u64, store: Arc<CommittedStore>, wal: Arc<Wal>) -> Self {
        Transaction {
            txn_id,
            staged_puts: HashMap::new(),
            staged_deletes: HashMap::new(),
            read_versions: HashMap::new(),
            store,
            wal,
        }
    }

    /// This transaction's id.
    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }

    /// Stage a write. Cancels any staged delete for the same key.
    pub fn put(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        self.wal.append(&WalEntry::Put {
            txn_id: self.txn_id,
            key: key.clone(),
            value: value.clone(),
        })?;
        self.staged_deletes.remove(&key);
        self.staged_puts.insert(key, value);
        Ok(())
    }

    /// Read through the transaction: staged put, then staged delete (absent),
    /// then the committed store.
    ///
    /// A committed read records the observed version for commit-time
    /// validation. First read wins; re-reading a key does not overwrite the
    /// recorded version.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if let Some(staged) = self.staged_puts.get(key) {
            return Some(staged.clone());
        }
        if self.staged_deletes.contains_key(key) {
            return None;
        }
        let committed = self.store.get(key);
        self.read_versions
            .entry(key.to_string())
            .or_insert_with(|| committed.as_ref().map(Value::version));
        committed
    }

    /// Stage a removal. Cancels any staged put for the same key.
    ///
    /// Returns `false` without logging anything if the key exists neither in
    /// the committed store nor among the staged puts.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        let prior = match self.staged_puts.get(key).cloned().or_else(|| self.store.get(key)) {
            Some(v) => v,
            None => return Ok(false),
        };
        self.wal.append(&WalEntry::Delete {
            txn_id: self.txn_id,
            key: key.to_string(),
        })?;
        self.staged_puts.remove(key);
        self.staged_deletes.insert(key.to_string(), prior);
        Ok(true)
    }

    /// Clone of the staged writes, for staged-state inspection and search.
    pub fn staged_state(&self) -> HashMap<String, Value> {
        self.staged_puts.clone()
    }

    /// The staged writes, by reference.
    pub fn staged_puts(&self) -> &HashMap<String, Value> {
        &self.staged_puts
    }

    /// Whether a delete is staged for this key.
    pub fn is_staged_deleted(&self, key: &str) -> bool {
        self.staged_deletes.contains_key(key)
    }

    /// Every key with a staged put or delete.
    pub fn touched_keys(&self) -> Vec<String> {
        self.staged_puts
            .keys()
            .chain(self.staged_deletes.keys())
            .cloned()
            .collect()
    }

    /// Validate and apply the transaction.
    ///
    /// Validation covers the keys this transaction staged (put or delete):
    /// each must still carry the version observed when this transaction
    /// first read it, and one mismatch aborts the whole transaction with
    /// [`Error::ConcurrencyConflict`], applying nothing. A staged key that
    /// was never read is a blind write and passes; a key that was read but
    /// never staged is a plain observation and never conflicts. On success
    /// the final versioned records are logged, the log is synced (the
    /// durability point), and the staged operations land in the committed
    /// store: deletes first, then puts at version `previous + 1` (or 1 for
    /// a fresh key). A value carrying an explicit nonzero version keeps it
    /// verbatim.
    pub fn commit(self) -> Result<()> {
        // One committer at a time per shard: the versions validated here
        // must not move before the apply below lands.
        let _guard = self.store.lock_commits();

        for key in self.staged_puts.keys().chain(self.staged_deletes.keys()) {
            if let Some(observed) = self.read_versions.get(key) {
                let current = self.store.version_of(key);
                if current != *observed {
                    debug!(
                        txn_id = self.txn_id,
                        key = key.as_str(),
                        "commit aborted on version mismatch"
                    );
                    return Err(Error::ConcurrencyConflict { key: key.clone() });
                }
            }
        }

        let mut final_puts = Vec::with_capacity(self.staged_puts.len());
        for (key, value) in &self.staged_puts {
            let versioned = if value.version() != 0 {
                value.clone()
            } else {
                let next = self.store.version_of(key).map_or(1, |prev| prev + 1);
                value.with_version(next)
            };
            final_puts.push((key.clone(), versioned));
        }

        // Re-log with assigned versions so recovery can apply verbatim.
        for (key, value) in &final_puts {
            self.wal.append(&WalEntry::Put {
                txn_id: self.txn_id,
                key: key.clone(),
                value: value.clone(),
            })?;
        }
        for key in self.staged_deletes.keys() {
            self.wal.append(&WalEntry::Delete {
                txn_id: self.txn_id,
                key: key.clone(),
            })?;
        }
        self.wal.append(&WalEntry::Commit(self.txn_id))?;
        self.wal.sync()?;

        for key in self.staged_deletes.keys() {
            self.store.apply_delete(key);
        }
        for (key, value) in final_puts {
            self.store.apply_put(key, value);
        }
        debug!(txn_id = self.txn_id, "transaction committed");
        Ok(())
    }

    /// Abandon the transaction. Staged state is discarded and never becomes
    /// visible.
    pub fn rollback(self) -> Result<()> {
        self.wal.append(&WalEntry::Rollback(self.txn_id))?;
        debug!(txn_id = self.txn_id, "transaction rolled back");
        Ok(())
    }
}
