//! Keyed hashing and key expansion.
//!
//! HMAC-SHA-256 derives per-merchant secrets from the master key; HKDF-SHA-256
//! separates purpose-specific subkeys (transport, record sealing).

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::keys::KEY_LENGTH;
use tokenvault_common::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA-256 of `data` under `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::Crypto(format!("Invalid HMAC key: {}", e)))?;
    mac.update(data);

    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Expand input key material into a purpose-bound key.
///
/// # Postconditions
/// - Output is deterministic for a given `(ikm, info)` pair
/// - Distinct `info` values yield independent keys
pub fn expand_key(ikm: &[u8], info: &[u8]) -> Result<[u8; KEY_LENGTH]> {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = [0u8; KEY_LENGTH];
    hk.expand(info, &mut okm)
        .map_err(|e| Error::Crypto(format!("Key expansion failed: {}", e)))?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_rfc4231_case_2() {
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?").unwrap();
        let expected = [
            0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95,
            0x75, 0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9,
            0x64, 0xec, 0x38, 0x43,
        ];
        assert_eq!(mac, expected);
    }

    #[test]
    fn test_expand_key_deterministic() {
        let k1 = expand_key(&[1u8; 32], b"transport").unwrap();
        let k2 = expand_key(&[1u8; 32], b"transport").unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_expand_key_separates_purposes() {
        let k1 = expand_key(&[1u8; 32], b"transport").unwrap();
        let k2 = expand_key(&[1u8; 32], b"record").unwrap();
        assert_ne!(k1, k2);
    }
}
