//! Authenticated encryption using AES-256-GCM.
//!
//! Every seal draws a fresh random 96-bit nonce. Additional authenticated
//! data binds the ciphertext to the context it was produced for; opening
//! under different AAD fails instead of returning wrong plaintext.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};

use crate::keys::KEY_LENGTH;
use tokenvault_common::{Error, Result};

/// Algorithm identifier carried on the wire.
pub const ALGORITHM: &str = "AES-256-GCM";

/// Nonce size for AES-GCM (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Encrypt plaintext bound to `aad`.
///
/// # Postconditions
/// - Returns nonce || ciphertext || tag
/// - The nonce is randomly generated
///
/// # Errors
/// - Returns error if key length is incorrect
/// - Returns error if encryption fails
pub fn seal(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|_| Error::Crypto("Encryption failed".to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypt data produced by [`seal`] under the same key and `aad`.
///
/// # Errors
/// - Returns error if key length is incorrect
/// - Returns error if the input is too short
/// - Returns error if authentication fails (tampered data or AAD mismatch)
pub fn open(key: &[u8], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Crypto("Ciphertext too short".to_string()));
    }

    let cipher = cipher_for(key)?;
    let (nonce_bytes, encrypted) = sealed.split_at(NONCE_SIZE);

    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: encrypted,
                aad,
            },
        )
        .map_err(|_| Error::Crypto("Decryption failed: authentication tag mismatch".to_string()))
}

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_LENGTH {
        return Err(Error::Crypto(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| Error::Crypto("Invalid key".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"{\"cardNumber\":\"4111111111111111\"}";

        let sealed = seal(&key, plaintext, b"POST|/api/tokens|req-1|sess-1").unwrap();
        let opened = open(&key, &sealed, b"POST|/api/tokens|req-1|sess-1").unwrap();

        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_sealed_size() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Test message";

        let sealed = seal(&key, plaintext, b"").unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_different_nonce_each_time() {
        let key = [42u8; KEY_LENGTH];

        let ct1 = seal(&key, b"same", b"aad").unwrap();
        let ct2 = seal(&key, b"same", b"aad").unwrap();

        assert_ne!(&ct1[..NONCE_SIZE], &ct2[..NONCE_SIZE]);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_aad_mismatch_fails() {
        let key = [7u8; KEY_LENGTH];
        let sealed = seal(&key, b"payload", b"POST|/api/tokens||s").unwrap();

        assert!(open(&key, &sealed, b"PUT|/api/tokens||s").is_err());
        assert!(open(&key, &sealed, b"POST|/api/other||s").is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = seal(&[1u8; KEY_LENGTH], b"Secret data", b"").unwrap();
        assert!(open(&[2u8; KEY_LENGTH], &sealed, b"").is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = [42u8; KEY_LENGTH];
        let mut sealed = seal(&key, b"Important data", b"").unwrap();
        sealed[NONCE_SIZE + 3] ^= 0xFF;

        assert!(open(&key, &sealed, b"").is_err());
    }

    #[test]
    fn test_short_input_fails() {
        let key = [42u8; KEY_LENGTH];
        assert!(open(&key, &[0u8; NONCE_SIZE + TAG_SIZE - 1], b"").is_err());
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(seal(&[0u8; 16], b"data", b"").is_err());
    }

    #[test]
    fn test_empty_plaintext() {
        let key = [42u8; KEY_LENGTH];
        let sealed = seal(&key, b"", b"ctx").unwrap();
        assert!(open(&key, &sealed, b"ctx").unwrap().is_empty());
    }
}
