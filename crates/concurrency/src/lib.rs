//! Transactions for the Coffer engine.
//!
//! Staged writes, optimistic commit-time validation, a per-session
//! transaction registry, and the durable transaction-id allocator.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;
pub mod txn_id;

pub use manager::TransactionManager;
pub use transaction::Transaction;
pub use txn_id::TxnIdAllocator;
