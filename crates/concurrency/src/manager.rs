//! Per-session transaction registry.
//!
//! At most one active transaction per session. The registry is keyed by an
//! explicit [`SessionId`] rather than anything ambient like thread identity,
//! so a caller driving many sessions from one thread (or one session across
//! threads) gets the same semantics.

use crate::transaction::Transaction;
use crate::txn_id::TxnIdAllocator;
use coffer_core::{Error, Result, SessionId, Value};
use coffer_storage::{CommittedStore, Wal, WalEntry};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Creates, tracks, and retires the active transaction of each session.
pub struct TransactionManager {
    active: DashMap<SessionId, Transaction>,
    allocator: Arc<TxnIdAllocator>,
    store: Arc<CommittedStore>,
    wal: Arc<Wal>,
}

impl TransactionManager {
    /// Build a manager over one shard's store and log.
    pub fn new(store: Arc<CommittedStore>, wal: Arc<Wal>, allocator: Arc<TxnIdAllocator>) -> Self {
        TransactionManager {
            active: DashMap::new(),
            allocator,
            store,
            wal,
        }
    }

    /// Start a transaction for the session, returning its id.
    ///
    /// Fails with [`Error::TransactionAlreadyActive`] if the session already
    /// holds one.
    pub fn begin(&self, session: SessionId) -> Result<u64> {
        if self.active.contains_key(&session) {
            return Err(Error::TransactionAlreadyActive(session));
        }
        let txn_id = self.allocator.next();
        self.wal.append(&WalEntry::Begin(txn_id))?;
        self.active.insert(
            session,
            Transaction::new(txn_id, Arc::clone(&self.store), Arc::clone(&self.wal)),
        );
        Ok(txn_id)
    }

    /// Whether the session holds an active transaction.
    pub fn is_active(&self, session: SessionId) -> bool {
        self.active.contains_key(&session)
    }

    /// Run `f` against the session's active transaction.
    pub fn with_active<R>(
        &self,
        session: SessionId,
        f: impl FnOnce(&mut Transaction) -> R,
    ) -> Result<R> {
        let mut entry = self
            .active
            .get_mut(&session)
            .ok_or(Error::NoActiveTransaction(session))?;
        Ok(f(entry.value_mut()))
    }

    /// Clone of the session's staged writes.
    pub fn staged_state(&self, session: SessionId) -> Result<HashMap<String, Value>> {
        self.with_active(session, |txn| txn.staged_state())
    }

    /// Commit the session's transaction.
    ///
    /// The session's slot is cleared whatever the outcome: a conflicting
    /// commit still ends the transaction, and retrying means beginning a new
    /// one. The id allocator is checkpointed after a successful commit.
    pub fn commit(&self, session: SessionId) -> Result<()> {
        let (_, txn) = self
            .active
            .remove(&session)
            .ok_or(Error::NoActiveTransaction(session))?;
        txn.commit()?;
        self.allocator.checkpoint()?;
        Ok(())
    }

    /// Roll back the session's transaction and clear its slot.
    pub fn rollback(&self, session: SessionId) -> Result<()> {
        let (_, txn) = self
            .active
            .remove(&session)
            .ok_or(Error::NoActiveTransaction(session))?;
        txn.rollback()
    }
}
