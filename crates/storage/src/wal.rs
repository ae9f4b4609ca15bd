//! Append-only, line-oriented write-ahead log.
//!
//! One record per line. Keys are percent-encoded so the `:` field separator
//! can never appear raw inside a key; serialized values already guarantee
//! this for their payload field. Append order is the total order recovery
//! replays in.

use coffer_core::{value, Error, Result, Value};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One write-ahead log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalEntry {
    /// A transaction started.
    Begin(u64),
    /// A staged or committed write.
    Put {
        /// Owning transaction.
        txn_id: u64,
        /// The key written.
        key: String,
        /// The value written.
        value: Value,
    },
    /// A staged or committed removal.
    Delete {
        /// Owning transaction.
        txn_id: u64,
        /// The key removed.
        key: String,
    },
    /// The transaction's effects are durable.
    Commit(u64),
    /// The transaction was abandoned.
    Rollback(u64),
}

impl WalEntry {
    /// The transaction this record belongs to.
    pub fn txn_id(&self) -> u64 {
        match self {
            WalEntry::Begin(id) | WalEntry::Commit(id) | WalEntry::Rollback(id) => *id,
            WalEntry::Put { txn_id, .. } | WalEntry::Delete { txn_id, .. } => *txn_id,
        }
    }

    /// Render this record as one log line (no trailing newline).
    pub fn encode(&self) -> String {
        match self {
            WalEntry::Begin(id) => format!("BEGIN:{id}"),
            WalEntry::Put { txn_id, key, value } => {
                format!("PUT:{}:{}:{}", txn_id, value::encode(key), value.serialize())
            }
            WalEntry::Delete { txn_id, key } => {
                format!("DELETE:{}:{}", txn_id, value::encode(key))
            }
            WalEntry::Commit(id) => format!("COMMIT:{id}"),
            WalEntry::Rollback(id) => format!("ROLLBACK:{id}"),
        }
    }

    /// Parse one log line. `line_no` is 1-based and only used for error
    /// reporting.
    pub fn decode(line: &str, line_no: usize) -> Result<Self> {
        let corrupt = |reason: &str| Error::CorruptWalEntry {
            line: line_no,
            reason: reason.to_string(),
        };
        let (op, rest) = line.split_once(':').ok_or_else(|| corrupt("missing operation separator"))?;
        let parse_id = |s: &str| {
            s.parse::<u64>()
                .map_err(|_| corrupt("transaction id is not an integer"))
        };
        match op {
            "BEGIN" => Ok(WalEntry::Begin(parse_id(rest)?)),
            "COMMIT" => Ok(WalEntry::Commit(parse_id(rest)?)),
            "ROLLBACK" => Ok(WalEntry::Rollback(parse_id(rest)?)),
            "DELETE" => {
                let (id, key) = rest
                    .split_once(':')
                    .ok_or_else(|| corrupt("DELETE record missing key"))?;
                Ok(WalEntry::Delete {
                    txn_id: parse_id(id)?,
                    key: value::decode(key)
                        .map_err(|_| corrupt("DELETE record has an undecodable key"))?,
                })
            }
            "PUT" => {
                let mut fields = rest.splitn(3, ':');
                let id = fields.next().ok_or_else(|| corrupt("PUT record missing fields"))?;
                let key = fields.next().ok_or_else(|| corrupt("PUT record missing key"))?;
                let serialized = fields
                    .next()
                    .ok_or_else(|| corrupt("PUT record missing value"))?;
                Ok(WalEntry::Put {
                    txn_id: parse_id(id)?,
                    key: value::decode(key)
                        .map_err(|_| corrupt("PUT record has an undecodable key"))?,
                    value: Value::deserialize(serialized)
                        .map_err(|_| corrupt("PUT record has an undecodable value"))?,
                })
            }
            _ => Err(corrupt("unknown operation")),
        }
    }
}

/// The append side of the log, plus the read path used by recovery.
pub struct Wal {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl Wal {
    /// Open the log at `path` for appending, creating it if absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Wal {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Where the log lives on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it to the OS.
    ///
    /// Flushing alone is not the durability point; call [`Wal::sync`] before
    /// acknowledging a commit.
    pub fn append(&self, entry: &WalEntry) -> Result<()> {
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", entry.encode())?;
        writer.flush()?;
        Ok(())
    }

    /// Force everything appended so far onto stable storage.
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Discard the log's contents. Called once a snapshot rewrite has made
    /// the logged transactions redundant.
    pub fn truncate(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .truncate(false)
            .open(&self.path)?;
        file.set_len(0)?;
        file.sync_all()?;
        *writer = BufWriter::new(file);
        Ok(())
    }

    /// Read every line back, decoding each independently so recovery can
    /// skip a torn tail without losing the records before it.
    pub fn read_entries(&self) -> Result<Vec<(usize, Result<WalEntry>)>> {
        self.writer.lock().flush()?;
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut entries = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let line_no = idx + 1;
            entries.push((line_no, WalEntry::decode(&line, line_no)));
        }
        Ok(entries)
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        let _ = self.writer.lock().flush();
    }
}
