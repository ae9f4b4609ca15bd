//! Core types for Coffer
//!
//! This crate defines the foundational types used throughout the system:
//! - Value: typed, versioned, immutable value container and its text codec
//! - ValueKind: discriminates the five supported value types
//! - Query: search query with pattern / range / kind filters
//! - SessionId: caller-supplied execution-context identifier
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod query;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use error::{Error, Result};
pub use query::{Query, QueryBuilder};
pub use types::{SessionId, ShardId};
pub use value::{Value, ValueKind};
