//! Deterministic card-on-file tokens.
//!
//! A recurring-billing merchant must be able to re-derive the same token
//! for the same card and contract on every payment attempt without keeping
//! a reverse mapping. The token is a pure function of
//! `(card, merchant, contract)` and the process master key.

use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

use crate::algorithm::{is_digits_of_len, TokenizationAlgorithm};
use crate::context::TokenizationContext;
use crate::token::{AlgorithmType, Token};
use tokenvault_common::{Error, Result};
use tokenvault_crypto::SecretMaterial;

/// Length of card-on-file tokens.
pub const COF_TOKEN_LENGTH: usize = 16;

/// HMAC-derived card-on-file tokenizer.
#[derive(Debug, Clone)]
pub struct CofTokenizer {
    secrets: Arc<SecretMaterial>,
}

impl CofTokenizer {
    /// Create a tokenizer bound to the process secret material.
    pub fn new(secrets: Arc<SecretMaterial>) -> Self {
        Self { secrets }
    }
}

impl TokenizationAlgorithm for CofTokenizer {
    fn tokenize(&self, context: &TokenizationContext) -> Result<Token> {
        if !context.is_cof {
            return Err(Error::InvalidContext(
                "card-on-file tokenization requires is_cof".to_string(),
            ));
        }
        let contract_id = context
            .cof_contract_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                Error::InvalidContext("card-on-file contract id is required".to_string())
            })?;
        let pan = context.normalized_card_number()?;
        let merchant_id = context.require_merchant()?;

        let seed = Zeroizing::new(format!("{}:{}:{}", pan.expose(), merchant_id, contract_id));
        let merchant_key = self.secrets.master_key().derive_merchant_key(merchant_id)?;
        let digest = Zeroizing::new(merchant_key.mac(seed.as_bytes())?);

        let token = digits_from_bytes(digest.as_slice(), COF_TOKEN_LENGTH);

        debug!(merchant_id, contract_id, card = %pan.masked(), "Derived card-on-file token");
        Ok(Token::new(token))
    }

    fn validate_token(&self, token: &str) -> bool {
        is_digits_of_len(token, COF_TOKEN_LENGTH)
    }

    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::Cof
    }

    fn token_format(&self) -> &'static str {
        "16-digit deterministic numeric"
    }
}

/// Fold bytes into `len` decimal digits.
///
/// Each byte is read as a signed 8-bit value and contributes `|b| mod 10`.
/// Positions past the end of `bytes` continue as `(prev + i) mod 10`. A
/// leading zero is replaced by 1.
fn digits_from_bytes(bytes: &[u8], len: usize) -> String {
    let mut digits: Vec<u8> = Vec::with_capacity(len);
    for i in 0..len {
        let digit = match bytes.get(i) {
            Some(&b) => (b as i8).unsigned_abs() % 10,
            None => (digits[i - 1] + (i % 10) as u8) % 10,
        };
        digits.push(digit);
    }
    if digits.first() == Some(&0) {
        digits[0] = 1;
    }
    digits.into_iter().map(|d| char::from(b'0' + d)).collect()
}
