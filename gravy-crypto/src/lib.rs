//! # GravyValet — Credential Store & Crypto (C2)
//!
//! Everything needed to keep a provider credential at rest: scrypt key
//! derivation, multi-key authenticated encryption, key rotation, and the
//! tagged `Credentials` sum type each provider implementation is handed at
//! invocation time.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`key_params`] | scrypt parameters stored alongside an encrypted blob |
//! | [`cipher`] | Key derivation, multi-key AEAD encrypt/decrypt, rotation |
//! | [`credentials`] | The `Credentials` variant enum and its header injection |
//!
//! Nothing here touches the database or the network; this crate only knows
//! how to turn plaintext credentials into an opaque blob and back.

pub mod cipher;
pub mod credentials;
pub mod key_params;

pub use cipher::{Cipher, CryptoError};
pub use credentials::Credentials;
pub use key_params::KeyParameters;
