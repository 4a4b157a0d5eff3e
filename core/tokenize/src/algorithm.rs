//! Tokenization strategy contract.

use crate::context::TokenizationContext;
use crate::token::{AlgorithmType, Token};
use tokenvault_common::{Error, Result};

/// Capability set shared by every tokenization strategy.
///
/// Implementations hold no per-call state and are safe to call
/// concurrently from many request handlers.
pub trait TokenizationAlgorithm: Send + Sync {
    /// Produce a token for the given context.
    ///
    /// # Postconditions
    /// - The returned token passes `validate_token`
    ///
    /// # Errors
    /// - `InvalidContext` if fields required by this strategy are absent
    fn tokenize(&self, context: &TokenizationContext) -> Result<Token>;

    /// Structural check of a token; no storage lookup.
    fn validate_token(&self, token: &str) -> bool;

    /// Routing identifier of this strategy.
    fn algorithm_type(&self) -> AlgorithmType;

    /// Human-readable description of the token format.
    fn token_format(&self) -> &'static str;

    /// Re-validate an inbound token, failing with `ValidationFailure`.
    fn ensure_valid(&self, token: &str) -> Result<()> {
        if self.validate_token(token) {
            Ok(())
        } else {
            Err(Error::ValidationFailure(format!(
                "token does not match {} format",
                self.algorithm_type()
            )))
        }
    }
}

/// True if `value` is exactly `len` ASCII digits.
pub(crate) fn is_digits_of_len(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}
