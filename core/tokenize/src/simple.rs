//! Random single-use tokens.

use rand::rngs::OsRng;
use rand::Rng;
use tracing::debug;

use crate::algorithm::{is_digits_of_len, TokenizationAlgorithm};
use crate::context::TokenizationContext;
use crate::token::{AlgorithmType, Token};
use tokenvault_common::Result;

/// Length of simple tokens.
pub const SIMPLE_TOKEN_LENGTH: usize = 16;

/// 16-digit tokens drawn from the OS CSPRNG.
///
/// Two calls with the same context yield unrelated tokens, so a simple
/// token cannot be linked back to the card or to other tokens for it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleTokenizer;

impl SimpleTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl TokenizationAlgorithm for SimpleTokenizer {
    fn tokenize(&self, context: &TokenizationContext) -> Result<Token> {
        let pan = context.normalized_card_number()?;
        let merchant_id = context.require_merchant()?;

        let mut rng = OsRng;
        let mut token = String::with_capacity(SIMPLE_TOKEN_LENGTH);
        token.push(char::from(b'0' + rng.gen_range(1..=9u8)));
        for _ in 1..SIMPLE_TOKEN_LENGTH {
            token.push(char::from(b'0' + rng.gen_range(0..=9u8)));
        }

        debug!(merchant_id, card = %pan.masked(), "Issued simple token");
        Ok(Token::new(token))
    }

    fn validate_token(&self, token: &str) -> bool {
        is_digits_of_len(token, SIMPLE_TOKEN_LENGTH)
    }

    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::Simple
    }

    fn token_format(&self) -> &'static str {
        "16-digit random numeric"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokenvault_common::Error;

    fn ctx() -> TokenizationContext {
        TokenizationContext::new("4111111111111111", "MERCH001")
    }

    #[test]
    fn test_shape() {
        let tokenizer = SimpleTokenizer::new();
        for _ in 0..200 {
            let token = tokenizer.tokenize(&ctx()).unwrap();
            assert_eq!(token.as_str().len(), 16);
            assert!(token.as_str().bytes().all(|b| b.is_ascii_digit()));
            assert_ne!(token.as_str().as_bytes()[0], b'0');
            assert!(tokenizer.validate_token(token.as_str()));
        }
    }

    #[test]
    fn test_not_deterministic() {
        let tokenizer = SimpleTokenizer::new();
        let tokens: HashSet<String> = (0..100)
            .map(|_| tokenizer.tokenize(&ctx()).unwrap().into_string())
            .collect();
        assert_eq!(tokens.len(), 100);
    }

    #[test]
    fn test_validation() {
        let tokenizer = SimpleTokenizer::new();
        assert!(tokenizer.validate_token("0000000000000000"));
        assert!(!tokenizer.validate_token("123"));
        assert!(!tokenizer.validate_token("12345678901234567"));
        assert!(!tokenizer.validate_token("abcdefghijklmnop"));
        assert!(matches!(
            tokenizer.ensure_valid("abc"),
            Err(Error::ValidationFailure(_))
        ));
    }

    #[test]
    fn test_missing_merchant_rejected() {
        let tokenizer = SimpleTokenizer::new();
        let result = tokenizer.tokenize(&TokenizationContext::new("4111111111111111", ""));
        assert!(matches!(result, Err(Error::InvalidContext(_))));
    }

    #[test]
    fn test_descriptors() {
        let tokenizer = SimpleTokenizer::new();
        assert_eq!(tokenizer.algorithm_type(), AlgorithmType::Simple);
        assert!(!tokenizer.token_format().is_empty());
    }
}
