//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::kdf::{expand_key, hmac_sha256};
use tokenvault_common::{Error, Result};

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Purpose tag for subkeys expanded from the master key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPurpose {
    /// Transport envelope AEAD key.
    Transport,
    /// Key sealing card material into vault records.
    RecordSealing,
}

impl KeyPurpose {
    fn info(&self) -> &'static [u8] {
        match self {
            Self::Transport => b"tokenvault/transport/v1",
            Self::RecordSealing => b"tokenvault/record/v1",
        }
    }
}

/// Process-wide master key.
///
/// This key is the root of the key hierarchy: per-merchant COF secrets and
/// purpose-bound subkeys are all derived from it.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
}

impl MasterKey {
    /// Create a master key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Decode a base64-encoded master key.
    ///
    /// # Errors
    /// - Returns error if the input is not valid base64
    /// - Returns error if the decoded key is not KEY_LENGTH bytes
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|_| Error::Config("Master key is not valid base64".to_string()))?,
        );

        if decoded.len() != KEY_LENGTH {
            return Err(Error::Config(format!(
                "Master key must be {} bytes, got {}",
                KEY_LENGTH,
                decoded.len()
            )));
        }

        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&decoded);
        Ok(Self { key })
    }

    /// Generate a random master key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; KEY_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Encode the key as base64 for provisioning into a secret store.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.key)
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Derive the per-merchant secret as HMAC-SHA-256(master, merchant_id).
    pub fn derive_merchant_key(&self, merchant_id: &str) -> Result<MerchantKey> {
        let derived = hmac_sha256(&self.key, merchant_id.as_bytes())?;
        Ok(MerchantKey { key: derived })
    }

    /// Expand a purpose-bound subkey.
    pub fn derive_subkey(&self, purpose: KeyPurpose) -> Result<SubKey> {
        let derived = expand_key(&self.key, purpose.info())?;
        Ok(SubKey { key: derived })
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.ct_eq(&other.key).into()
    }
}

impl Eq for MasterKey {}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// Per-merchant secret used by the card-on-file strategy.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MerchantKey {
    key: [u8; KEY_LENGTH],
}

impl MerchantKey {
    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Keyed hash of `data` under this merchant secret.
    pub fn mac(&self, data: &[u8]) -> Result<[u8; 32]> {
        hmac_sha256(&self.key, data)
    }
}

impl fmt::Debug for MerchantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MerchantKey([REDACTED])")
    }
}

/// Purpose-bound key expanded from the master key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SubKey {
    key: [u8; KEY_LENGTH],
}

impl SubKey {
    /// Create a subkey from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for SubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubKey([REDACTED])")
    }
}
