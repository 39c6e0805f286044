//! Multi-key authenticated encryption for credentials at rest.
//!
//! Key derivation is scrypt (intentionally expensive); derived keys are
//! cached by `(secret, params)` in a small bounded LRU so repeated
//! encrypt/decrypt calls against the same credentials record don't re-pay
//! the derivation cost on every request.
//!
//! Encryption uses AES-256-GCM: a random 96-bit nonce is prepended to the
//! ciphertext+tag, so `encrypted.len() == 12 + plaintext.len() + 16`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use shared::config::EncryptionConfig;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use thiserror::Error;

use crate::key_params::KeyParameters;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key parameters: {0}")]
    InvalidParams(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encryption failed")]
    Encryption,

    /// No secret in the ring (current or any prior) could decrypt the blob.
    #[error("decryption failed: no known secret matches")]
    Decryption,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

type CacheKey = (String, KeyParameters);

/// Derives keys and performs multi-key AEAD encrypt/decrypt over
/// credential blobs.
///
/// Holds the ordered secret ring (current secret first, then priors, in
/// the order a decrypt attempt should try them) and a bounded cache of
/// already-derived keys.
pub struct Cipher {
    secrets: Vec<String>,
    key_cache: Mutex<lru::LruCache<CacheKey, [u8; KEY_LEN]>>,
}

impl Cipher {
    pub fn new(config: &EncryptionConfig) -> Self {
        let mut secrets = Vec::with_capacity(1 + config.priors.len());
        secrets.push(config.secret.clone());
        secrets.extend(config.priors.iter().cloned());

        let cache_size = NonZeroUsize::new(config.derived_key_cache_size.max(1)).unwrap();
        Self { secrets, key_cache: Mutex::new(lru::LruCache::new(cache_size)) }
    }

    fn derive_key(&self, secret: &str, params: &KeyParameters) -> Result<[u8; KEY_LEN], CryptoError> {
        params.validate().map_err(CryptoError::InvalidParams)?;

        let cache_key = (secret.to_string(), params.clone());
        if let Some(key) = self.key_cache.lock().unwrap().get(&cache_key) {
            return Ok(*key);
        }

        let scrypt_params = scrypt::Params::new(
            params.log_n(),
            params.scrypt_block_size,
            params.scrypt_parallelization,
            KEY_LEN,
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        let mut derived = [0u8; KEY_LEN];
        scrypt::scrypt(secret.as_bytes(), &params.salt, &scrypt_params, &mut derived)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        self.key_cache.lock().unwrap().put(cache_key, derived);
        Ok(derived)
    }

    /// Encrypts with the current secret only — never a prior one.
    pub fn encrypt_bytes(&self, plaintext: &[u8], params: &KeyParameters) -> Result<Vec<u8>, CryptoError> {
        let current_secret = &self.secrets[0];
        let key_bytes = self.derive_key(current_secret, params)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher.encrypt(nonce, plaintext).map_err(|_| CryptoError::Encryption)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Tries the current secret, then each prior in order, until one
    /// produces a blob that authenticates.
    pub fn decrypt_bytes(&self, encrypted: &[u8], params: &KeyParameters) -> Result<Vec<u8>, CryptoError> {
        if encrypted.len() < NONCE_LEN {
            return Err(CryptoError::Decryption);
        }
        let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        for secret in &self.secrets {
            let key_bytes = self.derive_key(secret, params)?;
            let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
            if let Ok(plaintext) = cipher.decrypt(nonce, ciphertext) {
                return Ok(plaintext);
            }
        }
        Err(CryptoError::Decryption)
    }

    pub fn encrypt_json<T: Serialize>(&self, value: &T, params: &KeyParameters) -> Result<Vec<u8>, CryptoError> {
        let plaintext = serde_json::to_vec(value)?;
        self.encrypt_bytes(&plaintext, params)
    }

    pub fn decrypt_json<T: DeserializeOwned>(
        &self,
        encrypted: &[u8],
        params: &KeyParameters,
    ) -> Result<T, CryptoError> {
        let plaintext = self.decrypt_bytes(encrypted, params)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Re-encrypts a stored blob, either in place (same scrypt profile,
    /// new key only) or under fresh defaults (new salt and parameters).
    ///
    /// Both branches decrypt with the stored parameters (trying the whole
    /// secret ring) and re-encrypt with the current secret; they differ
    /// only in which `KeyParameters` the result is stamped with.
    pub fn rotate_encryption(
        &self,
        encrypted: &[u8],
        stored_params: &KeyParameters,
        config: &EncryptionConfig,
    ) -> Result<(Vec<u8>, KeyParameters), CryptoError> {
        let fresh_params = KeyParameters::generate(config);
        let target_params =
            if stored_params.has_same_shape(&fresh_params) { stored_params.clone() } else { fresh_params };

        let plaintext = self.decrypt_bytes(encrypted, stored_params)?;
        let rewrapped = self.encrypt_bytes(&plaintext, &target_params)?;
        tracing::debug!(
            in_place = stored_params.has_same_shape(&target_params),
            "rotated credential encryption"
        );
        Ok((rewrapped, target_params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn test_config(secret: &str, priors: Vec<&str>) -> EncryptionConfig {
        EncryptionConfig {
            secret: secret.to_string(),
            priors: priors.into_iter().map(str::to_string).collect(),
            scrypt_cost: 1 << 14,
            scrypt_block_size: 8,
            scrypt_parallelization: 1,
            salt_len: 17,
            derived_key_cache_size: 8,
        }
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        access_token: String,
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let config = test_config("super-secret-value-123456789012", vec![]);
        let cipher = Cipher::new(&config);
        let params = KeyParameters::generate(&config);

        let encrypted = cipher.encrypt_bytes(b"hello world", &params).unwrap();
        let decrypted = cipher.decrypt_bytes(&encrypted, &params).unwrap();
        assert_eq!(decrypted, b"hello world");
    }

    #[test]
    fn test_json_round_trip() {
        let config = test_config("super-secret-value-123456789012", vec![]);
        let cipher = Cipher::new(&config);
        let params = KeyParameters::generate(&config);

        let payload = Payload { access_token: "AT1".to_string() };
        let encrypted = cipher.encrypt_json(&payload, &params).unwrap();
        let decrypted: Payload = cipher.decrypt_json(&encrypted, &params).unwrap();
        assert_eq!(decrypted, payload);
    }

    #[test]
    fn test_decrypt_with_prior_secret_succeeds() {
        let old_config = test_config("old-secret-value-1234567890123", vec![]);
        let old_cipher = Cipher::new(&old_config);
        let params = KeyParameters::generate(&old_config);
        let encrypted = old_cipher.encrypt_bytes(b"legacy payload", &params).unwrap();

        let rotated_config =
            test_config("new-secret-value-1234567890123", vec!["old-secret-value-1234567890123"]);
        let new_cipher = Cipher::new(&rotated_config);

        let decrypted = new_cipher.decrypt_bytes(&encrypted, &params).unwrap();
        assert_eq!(decrypted, b"legacy payload");
    }

    #[test]
    fn test_decrypt_fails_with_unknown_secret() {
        let config_a = test_config("secret-a-value-12345678901234", vec![]);
        let cipher_a = Cipher::new(&config_a);
        let params = KeyParameters::generate(&config_a);
        let encrypted = cipher_a.encrypt_bytes(b"payload", &params).unwrap();

        let config_b = test_config("secret-b-value-12345678901234", vec![]);
        let cipher_b = Cipher::new(&config_b);
        assert!(matches!(cipher_b.decrypt_bytes(&encrypted, &params), Err(CryptoError::Decryption)));
    }

    #[test]
    fn test_rotate_in_place_keeps_params_when_shape_unchanged() {
        let config = test_config("secret-v1-value-123456789012345", vec![]);
        let cipher = Cipher::new(&config);
        let params = KeyParameters::generate(&config);
        let encrypted = cipher.encrypt_bytes(b"rotate me", &params).unwrap();

        let (rotated, new_params) = cipher.rotate_encryption(&encrypted, &params, &config).unwrap();
        assert_eq!(new_params, params);
        assert_eq!(cipher.decrypt_bytes(&rotated, &new_params).unwrap(), b"rotate me");
    }

    #[test]
    fn test_rotate_picks_fresh_params_when_defaults_changed() {
        let old_config = test_config("secret-v1-value-123456789012345", vec![]);
        let cipher = Cipher::new(&old_config);
        let old_params = KeyParameters::generate(&old_config);
        let encrypted = cipher.encrypt_bytes(b"upgrade me", &old_params).unwrap();

        let mut new_config = old_config.clone();
        new_config.scrypt_cost = 1 << 15;
        let (rotated, new_params) = cipher.rotate_encryption(&encrypted, &old_params, &new_config).unwrap();
        assert_ne!(new_params, old_params);
        assert_eq!(cipher.decrypt_bytes(&rotated, &new_params).unwrap(), b"upgrade me");
    }
}
