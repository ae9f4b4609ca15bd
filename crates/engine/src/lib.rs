//! The Coffer engine: shards, search, and consistent-hash routing.
//!
//! A [`Shard`] composes the storage and transaction layers into one
//! independently durable unit; a [`ShardedStore`] spreads keys across shards
//! with a consistent-hash ring and is the surface the embedding application
//! talks to.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod ring;
pub mod shard;
pub mod sharded;

pub use config::StoreConfig;
pub use ring::{HashRing, ShardId};
pub use shard::Shard;
pub use sharded::ShardedStore;

// The types callers need to drive the engine.
pub use coffer_core::{Error, Query, QueryBuilder, Result, SessionId, Value, ValueKind};
pub use coffer_storage::{Encryption, EncryptionConfig, NoEncryption, XorEncryption};
