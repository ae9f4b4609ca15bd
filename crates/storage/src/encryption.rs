//! Pluggable at-rest encryption for snapshot lines.
//!
//! The snapshot writer treats encryption as an opaque byte transform keyed by
//! an out-of-band secret; it never branches on the concrete strategy. The
//! in-tree strategies are [`NoEncryption`] and [`XorEncryption`]; stronger
//! schemes can be supplied by implementing [`Encryption`].

use coffer_core::{Error, Result};
use std::sync::Arc;

/// A symmetric byte transform applied to serialized snapshot values.
pub trait Encryption: Send + Sync {
    /// Transform plaintext bytes with the given key.
    fn encrypt(&self, data: &[u8], key: &[u8]) -> Vec<u8>;

    /// Invert [`Encryption::encrypt`]. Fails if the ciphertext is not valid
    /// for this strategy.
    fn decrypt(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>>;
}

/// Identity transform.
#[derive(Debug, Default)]
pub struct NoEncryption;

impl Encryption for NoEncryption {
    fn encrypt(&self, data: &[u8], _key: &[u8]) -> Vec<u8> {
        data.to_vec()
    }

    fn decrypt(&self, data: &[u8], _key: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// Repeating-key XOR. Obfuscation, not cryptography; kept for files written
/// by earlier deployments.
#[derive(Debug, Default)]
pub struct XorEncryption;

impl XorEncryption {
    fn transform(data: &[u8], key: &[u8]) -> Vec<u8> {
        if key.is_empty() {
            return data.to_vec();
        }
        data.iter()
            .zip(key.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect()
    }
}

impl Encryption for XorEncryption {
    fn encrypt(&self, data: &[u8], key: &[u8]) -> Vec<u8> {
        Self::transform(data, key)
    }

    fn decrypt(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        if key.is_empty() && !data.is_empty() {
            return Err(Error::MalformedValue(
                "cannot decrypt with an empty key".to_string(),
            ));
        }
        Ok(Self::transform(data, key))
    }
}

/// Encryption settings carried by a snapshot file.
#[derive(Clone)]
pub struct EncryptionConfig {
    /// Whether new snapshot writes are encrypted.
    pub enabled: bool,
    /// The shared secret handed to the strategy.
    pub key: String,
    /// The byte transform.
    pub strategy: Arc<dyn Encryption>,
}

impl EncryptionConfig {
    /// Encryption turned off.
    pub fn disabled() -> Self {
        EncryptionConfig {
            enabled: false,
            key: String::new(),
            strategy: Arc::new(NoEncryption),
        }
    }

    /// XOR encryption with the given key.
    pub fn xor(key: impl Into<String>) -> Self {
        EncryptionConfig {
            enabled: true,
            key: key.into(),
            strategy: Arc::new(XorEncryption),
        }
    }
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self::disabled()
    }
}
