//! Crash recovery: snapshot load followed by WAL replay.
//!
//! Replay keeps a map of open transactions keyed by transaction id. Put and
//! Delete records accumulate per key with last-write-wins; a Commit applies
//! the accumulated deletes then puts to the store, a Rollback or end-of-log
//! discards them. Commit-time records carry final assigned versions and are
//! applied verbatim, so replaying the same log twice converges to the same
//! state. Unparseable lines (typically a torn tail from a crash mid-append)
//! are skipped and counted, never guessed at.

use crate::snapshot::SnapshotFile;
use crate::store::CommittedStore;
use crate::wal::{Wal, WalEntry};
use coffer_core::{Result, Value};
use std::collections::HashMap;
use tracing::{info, warn};

/// What recovery found and did, for logging and allocator re-seeding.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Committed transactions replayed into the store.
    pub txns_applied: usize,
    /// Transactions discarded (rolled back or missing a Commit).
    pub txns_discarded: usize,
    /// WAL lines that failed to decode and were skipped.
    pub entries_skipped: usize,
    /// Highest transaction id seen anywhere in the log; the id allocator
    /// must restart above this.
    pub max_txn_id: u64,
}

#[derive(Debug, Clone)]
enum PendingOp {
    Put(Value),
    Delete,
}

/// Rebuild committed state from the snapshot and the log.
pub fn recover(snapshot: &SnapshotFile, wal: &Wal, store: &CommittedStore) -> Result<RecoveryReport> {
    for (key, value) in snapshot.load()? {
        store.apply_put(key, value);
    }

    let mut report = RecoveryReport::default();
    let mut open: HashMap<u64, HashMap<String, PendingOp>> = HashMap::new();

    for (line_no, entry) in wal.read_entries()? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(line = line_no, %err, "skipping unparseable log line");
                report.entries_skipped += 1;
                continue;
            }
        };
        report.max_txn_id = report.max_txn_id.max(entry.txn_id());
        match entry {
            WalEntry::Begin(id) => {
                open.entry(id).or_default();
            }
            WalEntry::Put { txn_id, key, value } => {
                open.entry(txn_id).or_default().insert(key, PendingOp::Put(value));
            }
            WalEntry::Delete { txn_id, key } => {
                open.entry(txn_id).or_default().insert(key, PendingOp::Delete);
            }
            WalEntry::Rollback(id) => {
                if open.remove(&id).is_some() {
                    report.txns_discarded += 1;
                }
            }
            WalEntry::Commit(id) => {
                if let Some(ops) = open.remove(&id) {
                    for (key, op) in ops {
                        match op {
                            PendingOp::Delete => {
                                store.apply_delete(&key);
                            }
                            PendingOp::Put(value) => store.apply_put(key, value),
                        }
                    }
                    report.txns_applied += 1;
                }
            }
        }
    }

    // Anything still open never committed
    report.txns_discarded += open.len();

    info!(
        applied = report.txns_applied,
        discarded = report.txns_discarded,
        skipped = report.entries_skipped,
        max_txn_id = report.max_txn_id,
        entries = store.len(),
        "recovery complete"
    );
    Ok(report)
}
