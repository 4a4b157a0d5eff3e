//! Tokenization input.

use tokenvault_common::{Error, Result, SensitiveString};

/// Ephemeral input to a tokenize call.
///
/// Exists only for the duration of the call and is never persisted. The
/// card number is zeroized on drop and only ever rendered masked.
#[derive(Debug, Clone)]
pub struct TokenizationContext {
    /// Raw PAN as supplied by the caller.
    pub card_number: SensitiveString,
    /// Merchant the token is issued for.
    pub merchant_id: String,
    /// Whether this is a card-on-file (recurring) tokenization.
    pub is_cof: bool,
    /// Recurring contract identifier, present iff `is_cof`.
    pub cof_contract_id: Option<String>,
    /// Optional platform identifier.
    pub platform_id: Option<String>,
    /// Optional customer identifier.
    pub customer_id: Option<String>,
}

impl TokenizationContext {
    /// Create a one-off (non card-on-file) context.
    pub fn new(card_number: impl Into<String>, merchant_id: impl Into<String>) -> Self {
        Self {
            card_number: SensitiveString::new(card_number),
            merchant_id: merchant_id.into(),
            is_cof: false,
            cof_contract_id: None,
            platform_id: None,
            customer_id: None,
        }
    }

    /// Create a card-on-file context for a recurring contract.
    pub fn card_on_file(
        card_number: impl Into<String>,
        merchant_id: impl Into<String>,
        contract_id: impl Into<String>,
    ) -> Self {
        Self {
            is_cof: true,
            cof_contract_id: Some(contract_id.into()),
            ..Self::new(card_number, merchant_id)
        }
    }

    /// Attach a platform identifier.
    pub fn with_platform(mut self, platform_id: impl Into<String>) -> Self {
        self.platform_id = Some(platform_id.into());
        self
    }

    /// Attach a customer identifier.
    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    /// The PAN with whitespace stripped.
    ///
    /// # Errors
    /// - Returns `InvalidContext` if the result is empty or contains
    ///   anything other than ASCII digits
    pub fn normalized_card_number(&self) -> Result<SensitiveString> {
        let normalized: String = self
            .card_number
            .expose()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let normalized = SensitiveString::new(normalized);

        if normalized.is_empty() {
            return Err(Error::InvalidContext("card number is required".to_string()));
        }
        if !normalized.expose().bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidContext(
                "card number must contain only digits".to_string(),
            ));
        }

        Ok(normalized)
    }

    /// The merchant identifier, rejecting blank values.
    pub fn require_merchant(&self) -> Result<&str> {
        let merchant = self.merchant_id.trim();
        if merchant.is_empty() {
            return Err(Error::InvalidContext("merchant id is required".to_string()));
        }
        Ok(&self.merchant_id)
    }
}
