//! Error types for Coffer
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::types::{SessionId, ShardId};
use std::io;
use thiserror::Error;

/// Result type alias for Coffer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Coffer store
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (snapshot or WAL file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialized value text that cannot be decoded
    #[error("malformed value: {0}")]
    MalformedValue(String),

    /// Unparseable line in a snapshot file
    #[error("corrupt snapshot at line {line}: {reason}")]
    CorruptSnapshot {
        /// 1-based line number within the snapshot file
        line: usize,
        /// What failed to parse
        reason: String,
    },

    /// Unparseable line in the write-ahead log
    #[error("corrupt WAL entry at line {line}: {reason}")]
    CorruptWalEntry {
        /// 1-based line number within the WAL file
        line: usize,
        /// What failed to parse
        reason: String,
    },

    /// Commit-time version mismatch; the whole transaction aborts
    #[error("concurrency conflict on key {key:?}")]
    ConcurrencyConflict {
        /// The first key whose committed version no longer matches
        key: String,
    },

    /// `begin` called while the session already holds a transaction
    #[error("transaction already active for session {0}")]
    TransactionAlreadyActive(SessionId),

    /// Commit/rollback/staged access without an open transaction
    #[error("no active transaction for session {0}")]
    NoActiveTransaction(SessionId),

    /// A search query with no pattern, no range, and no kind filter
    #[error("query must specify at least one of pattern, range, or kind")]
    EmptyQuery,

    /// A search pattern that is not a valid regular expression
    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),

    /// Point operation attempted against a store with no shards
    #[error("store has no shards")]
    NoShards,

    /// A key routed to a shard that is not open
    #[error("shard {0} is not open")]
    ShardUnavailable(ShardId),
}
