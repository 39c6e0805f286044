//! Key-derivation parameters stored next to an `ExternalCredentials` blob.
//!
//! Considering recommendations from RFC 7914 (scrypt) and NIST SP 800-132:
//! `scrypt_cost` ("N") a power of two between 2^14 and 2^20, bounded above
//! by `2^(128*r/8)`; `scrypt_block_size` ("r") recommended 8;
//! `scrypt_parallelization` ("p") recommended 1, bounded above by
//! `((2^32-1)*32) / (128*r)`.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use shared::config::EncryptionConfig;

/// scrypt parameters plus the salt used for one encrypted blob.
///
/// Persisted alongside the blob (not derivable from it) so a stored
/// credential can always be decrypted even after the process defaults
/// change — only freshly-encrypted blobs pick up new defaults.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyParameters {
    pub salt: Vec<u8>,
    pub scrypt_cost: u32,
    pub scrypt_block_size: u32,
    pub scrypt_parallelization: u32,
}

impl KeyParameters {
    /// Builds parameters from the process's current defaults, with a fresh
    /// random salt. Used both for first-time encryption and for the
    /// "upgrade defaults" branch of [`crate::cipher::Cipher::rotate_encryption`].
    pub fn generate(config: &EncryptionConfig) -> Self {
        let mut salt = vec![0u8; config.salt_len];
        rand::thread_rng().fill_bytes(&mut salt);
        Self {
            salt,
            scrypt_cost: config.scrypt_cost,
            scrypt_block_size: config.scrypt_block_size,
            scrypt_parallelization: config.scrypt_parallelization,
        }
    }

    /// Validates the RFC 7914 bounds. Called on every deserialization from
    /// storage so a corrupted or hand-edited row fails loudly instead of
    /// quietly weakening key derivation.
    pub fn validate(&self) -> Result<(), String> {
        if self.scrypt_block_size <= 1 {
            return Err("scrypt_block_size must be > 1".to_string());
        }
        let cost_log2 = (self.scrypt_cost as f64).log2();
        if self.scrypt_cost <= 1 || cost_log2.fract() != 0.0 {
            return Err("scrypt_cost must be a power of two greater than 1".to_string());
        }
        if cost_log2 > (128.0 * self.scrypt_block_size as f64 / 8.0) {
            return Err("scrypt_cost too large for scrypt_block_size".to_string());
        }
        let max_parallelization =
            ((u32::MAX as u64 - 1) * 32) as f64 / (128.0 * self.scrypt_block_size as f64);
        if self.scrypt_parallelization as f64 > max_parallelization {
            return Err("scrypt_parallelization too large for scrypt_block_size".to_string());
        }
        Ok(())
    }

    /// Upper bound scrypt needs to reserve, in bytes, matching `scrypt`'s
    /// own `Params::new` memory accounting.
    pub fn memory_required(&self) -> u64 {
        self.scrypt_cost as u64 * self.scrypt_block_size as u64 * 129
    }

    /// `log2(scrypt_cost)`, the form the `scrypt` crate's `Params::new` wants.
    pub fn log_n(&self) -> u8 {
        (self.scrypt_cost as f64).log2().round() as u8
    }

    /// Whether two parameter sets would derive with the same cost profile
    /// (salt length included) — used to decide whether a rotation can
    /// re-wrap under the existing salt or needs a fresh one.
    pub fn has_same_shape(&self, other: &Self) -> bool {
        self.salt.len() == other.salt.len()
            && self.scrypt_cost == other.scrypt_cost
            && self.scrypt_block_size == other.scrypt_block_size
            && self.scrypt_parallelization == other.scrypt_parallelization
    }
}
