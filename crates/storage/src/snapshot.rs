//! The on-disk snapshot of one shard's committed state.
//!
//! Format, one entry per line after a header:
//!
//! ```text
//! version=2,encryptionEnabled=<true|false>
//! <percent-encoded-key>=<KIND>:<version>:<payload>
//! ```
//!
//! When encryption is enabled the serialized value is run through the
//! configured strategy and base64-encoded, so the line stays printable. The
//! header written with the file, not the current settings, decides how a file
//! is decoded on load; flipping encryption at runtime therefore never makes
//! older files unreadable. Files from before the header was introduced (bare
//! `key=value` lines) are still accepted.

use crate::encryption::EncryptionConfig;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use coffer_core::{value, Error, Result, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const HEADER_PREFIX: &str = "version=";

/// Reader/writer for one shard's snapshot file.
pub struct SnapshotFile {
    path: PathBuf,
    encryption: Mutex<EncryptionConfig>,
}

impl SnapshotFile {
    /// Address a snapshot at `path`. The file is created lazily on the first
    /// save; a missing file loads as an empty store.
    pub fn new(path: impl Into<PathBuf>, encryption: EncryptionConfig) -> Self {
        SnapshotFile {
            path: path.into(),
            encryption: Mutex::new(encryption),
        }
    }

    /// Where the snapshot lives on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Swap the encryption settings used for subsequent saves.
    pub fn set_encryption(&self, config: EncryptionConfig) {
        *self.encryption.lock() = config;
    }

    /// Atomically rewrite the snapshot with the given committed entries.
    pub fn save(&self, entries: &[(String, Value)]) -> Result<()> {
        let config = self.encryption.lock().clone();
        let mut out = String::new();
        out.push_str(&format!("version=2,encryptionEnabled={}\n", config.enabled));
        for (key, val) in entries {
            let serialized = val.serialize();
            let line_value = if config.enabled {
                let cipher = config.strategy.encrypt(serialized.as_bytes(), config.key.as_bytes());
                BASE64.encode(cipher)
            } else {
                serialized
            };
            out.push_str(&format!("{}={}\n", value::encode(key), line_value));
        }

        // Write-then-rename so a crash mid-save leaves the old file intact.
        let tmp = self.path.with_extension("snap.tmp");
        fs::write(&tmp, out)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), entries = entries.len(), "snapshot rewritten");
        Ok(())
    }

    /// Load the snapshot into a map. A missing file is an empty store.
    pub fn load(&self) -> Result<HashMap<String, Value>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        let header = match contents.lines().next() {
            Some(first) if first.starts_with(HEADER_PREFIX) => first,
            _ => return self.load_legacy(&contents),
        };
        let encrypted = Self::parse_header(header)?;

        let config = self.encryption.lock().clone();
        let mut state = HashMap::new();
        for (idx, line) in contents.lines().enumerate().skip(1) {
            if line.is_empty() {
                continue;
            }
            let line_no = idx + 1;
            let corrupt = |reason: &str| Error::CorruptSnapshot {
                line: line_no,
                reason: reason.to_string(),
            };
            let (raw_key, raw_value) = line
                .split_once('=')
                .ok_or_else(|| corrupt("missing key/value separator"))?;
            let key =
                value::decode(raw_key).map_err(|_| corrupt("undecodable key"))?;
            let serialized = if encrypted {
                let cipher = BASE64
                    .decode(raw_value)
                    .map_err(|_| corrupt("value is not valid base64"))?;
                let plain = config
                    .strategy
                    .decrypt(&cipher, config.key.as_bytes())
                    .map_err(|_| corrupt("value failed to decrypt"))?;
                String::from_utf8(plain).map_err(|_| corrupt("decrypted value is not UTF-8"))?
            } else {
                raw_value.to_string()
            };
            let val = Value::deserialize(&serialized).map_err(|_| corrupt("undecodable value"))?;
            state.insert(key, val);
        }
        Ok(state)
    }

    /// Headerless files written by early deployments: plain `key=value`
    /// lines, never encrypted, keys not percent-encoded.
    fn load_legacy(&self, contents: &str) -> Result<HashMap<String, Value>> {
        let mut state = HashMap::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let line_no = idx + 1;
            let corrupt = |reason: &str| Error::CorruptSnapshot {
                line: line_no,
                reason: reason.to_string(),
            };
            let (key, raw_value) = line
                .split_once('=')
                .ok_or_else(|| corrupt("missing key/value separator"))?;
            let val = Value::deserialize(raw_value).map_err(|_| corrupt("undecodable value"))?;
            state.insert(key.to_string(), val);
        }
        Ok(state)
    }

    fn parse_header(header: &str) -> Result<bool> {
        let corrupt = |reason: &str| Error::CorruptSnapshot {
            line: 1,
            reason: reason.to_string(),
        };
        for field in header.split(',') {
            if let Some(flag) = field.strip_prefix("encryptionEnabled=") {
                return flag
                    .parse::<bool>()
                    .map_err(|_| corrupt("encryptionEnabled is not a boolean"));
            }
        }
        Err(corrupt("header missing encryptionEnabled"))
    }
}
