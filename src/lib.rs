//! Coffer - embeddable sharded key-value store with optimistic transactions.
//!
//! Keys are spread over consistent-hashed shards, each independently durable
//! through a snapshot file and a write-ahead log. Writes are staged inside a
//! per-session transaction and validated optimistically at commit time.
//!
//! # Quick Start
//!
//! ```ignore
//! use cofferdb::{SessionId, ShardedStore, StoreConfig, Value};
//!
//! let store = ShardedStore::open(StoreConfig::new("./data"))?;
//! let session = SessionId(1);
//!
//! store.begin_transaction(session)?;
//! store.put(session, "age", Value::integer(0, 25))?;
//! store.commit(session)?;
//! ```
//!
//! # Architecture
//!
//! The engine crate is the only public surface; storage and transaction
//! internals stay behind it. A [`ShardedStore`] routes point operations to
//! one [`Shard`] and fans transaction control and search out to all of them.

// Re-export the public API from coffer-engine
pub use coffer_engine::*;
