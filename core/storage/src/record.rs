//! Vault record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// String metadata attached to a record (merchant, platform, expiry hints).
pub type TokenMetadata = BTreeMap<String, String>;

/// Encrypted card material stored under a token id.
///
/// The ciphertext is opaque to the vault: it is produced and consumed by
/// the orchestration layer and never inspected here.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedTokenData {
    /// Primary key; matches the token value.
    pub token_id: String,
    /// Protected card material.
    #[serde(with = "base64_bytes")]
    pub encrypted_data: Vec<u8>,
    /// Merchant, platform and expiry hints.
    pub metadata: TokenMetadata,
    /// First store of this token id.
    pub created_at: DateTime<Utc>,
    /// Last store or metadata update.
    pub updated_at: DateTime<Utc>,
    /// Incremented on every write, starting at 1.
    pub version: u64,
}

impl EncryptedTokenData {
    /// Create a record for a token id and its ciphertext.
    pub fn new(token_id: impl Into<String>, encrypted_data: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            token_id: token_id.into(),
            encrypted_data,
            metadata: TokenMetadata::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for EncryptedTokenData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedTokenData")
            .field("token_id", &self.token_id)
            .field("encrypted_data", &format_args!("[{} bytes]", self.encrypted_data.len()))
            .field("metadata", &self.metadata)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("version", &self.version)
            .finish()
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
