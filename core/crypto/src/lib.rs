//! Cryptographic primitives for TokenVault.
//!
//! This module provides:
//! - Authenticated encryption using AES-256-GCM with associated data
//! - HMAC-SHA-256 and HKDF-SHA-256 key derivation
//! - Secure key management with automatic zeroization
//! - Loading of the process-wide master key
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Constant-time comparison of key material

pub mod aead;
pub mod kdf;
pub mod keys;
pub mod secrets;

pub use aead::{open, seal, ALGORITHM};
pub use kdf::{expand_key, hmac_sha256};
pub use keys::{KeyPurpose, MasterKey, MerchantKey, SubKey, KEY_LENGTH};
pub use secrets::{KeySource, SecretMaterial};
