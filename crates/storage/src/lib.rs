//! Durable storage for the Coffer engine.
//!
//! This crate owns everything below the transaction layer: the bounded
//! eviction cache, the full committed-state store it fronts, the snapshot
//! file format, the write-ahead log, crash recovery, and the pluggable
//! encryption capability applied to snapshot lines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod encryption;
pub mod recovery;
pub mod snapshot;
pub mod store;
pub mod wal;

pub use cache::EvictionCache;
pub use encryption::{Encryption, EncryptionConfig, NoEncryption, XorEncryption};
pub use recovery::{recover, RecoveryReport};
pub use snapshot::SnapshotFile;
pub use store::CommittedStore;
pub use wal::{Wal, WalEntry};
