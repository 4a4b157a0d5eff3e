//! Envelope wire format.
//!
//! ```json
//! {
//!   "encryptedData": "<base64 nonce||ciphertext||tag>",
//!   "algorithm": "AES-256-GCM",
//!   "timestamp": 1718000000000
//! }
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use tokenvault_common::{Error, Result};
use tokenvault_crypto::{open, seal, SubKey, ALGORITHM};

/// Encrypted body exchanged with envelope-capable clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Base64 of nonce, ciphertext and tag.
    pub encrypted_data: String,
    /// Cipher identifier; always `AES-256-GCM`.
    pub algorithm: String,
    /// Wall-clock seal time in milliseconds since the epoch.
    pub timestamp: i64,
}

impl Envelope {
    /// Seal a plaintext body bound to `aad` under a fresh nonce.
    pub fn seal(key: &SubKey, plaintext: &[u8], aad: &[u8]) -> Result<Self> {
        let sealed = seal(key.as_bytes(), plaintext, aad)?;
        Ok(Self {
            encrypted_data: STANDARD.encode(sealed),
            algorithm: ALGORITHM.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    /// Authenticate and decrypt the envelope.
    ///
    /// # Errors
    /// - `Crypto` if the algorithm is unsupported, the payload is not
    ///   base64, or authentication fails under `aad`
    pub fn open(&self, key: &SubKey, aad: &[u8]) -> Result<Vec<u8>> {
        if self.algorithm != ALGORITHM {
            return Err(Error::Crypto(format!(
                "unsupported envelope algorithm '{}'",
                self.algorithm
            )));
        }
        let sealed = STANDARD
            .decode(&self.encrypted_data)
            .map_err(|e| Error::Crypto(format!("envelope payload is not base64: {}", e)))?;
        open(key.as_bytes(), &sealed, aad)
    }

    /// Parse an envelope from a JSON body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| Error::Serialization(format!("invalid envelope: {}", e)))
    }

    /// Serialize the envelope to a JSON body.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}
