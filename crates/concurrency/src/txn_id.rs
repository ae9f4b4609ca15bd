//! Durable allocation of transaction ids.
//!
//! Ids come from a single monotonically increasing counter shared by every
//! shard, checkpointed to disk on commit so a restart never reissues an id
//! that may already appear in a log. Recovery re-seeds the counter with the
//! highest id it saw, which covers ids issued after the last checkpoint.

use coffer_core::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic transaction-id source backed by a checkpoint file.
pub struct TxnIdAllocator {
    next: AtomicU64,
    checkpoint_path: PathBuf,
}

impl TxnIdAllocator {
    /// Open the allocator, resuming after the last checkpointed id. A
    /// missing checkpoint file starts the counter at 1.
    pub fn open(checkpoint_path: impl Into<PathBuf>) -> Result<Self> {
        let checkpoint_path = checkpoint_path.into();
        let last_issued = match fs::read_to_string(&checkpoint_path) {
            Ok(text) => text.trim().parse::<u64>().unwrap_or(0),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        Ok(TxnIdAllocator {
            next: AtomicU64::new(last_issued + 1),
            checkpoint_path,
        })
    }

    /// Issue the next id.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Ensure future ids are strictly greater than `max_seen`. Called with
    /// recovery's highest observed id.
    pub fn reseed(&self, max_seen: u64) {
        self.next.fetch_max(max_seen + 1, Ordering::SeqCst);
    }

    /// Persist the high-water mark. Called after each successful commit.
    pub fn checkpoint(&self) -> Result<()> {
        let last_issued = self.next.load(Ordering::SeqCst).saturating_sub(1);
        let tmp = self.checkpoint_path.with_extension("checkpoint.tmp");
        fs::write(&tmp, last_issued.to_string())?;
        fs::rename(&tmp, &self.checkpoint_path)?;
        Ok(())
    }
}
