//! Common types used throughout TokenVault.

use std::fmt;
use zeroize::Zeroize;

/// Sensitive text (a PAN, typically) that zeroizes on drop.
///
/// `Debug` and `Display` print the masked form only.
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveString(String);

impl SensitiveString {
    /// Wrap a sensitive string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the raw value.
    ///
    /// # Security
    /// The returned slice must not be logged or placed in error messages.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Get the length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Masked representation safe for logs.
    pub fn masked(&self) -> String {
        mask_pan(&self.0)
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveString({})", self.masked())
    }
}

impl fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Mask a card number, keeping at most the first six and last four digits.
///
/// Values of ten characters or fewer are masked entirely.
pub fn mask_pan(pan: &str) -> String {
    let chars: Vec<char> = pan.chars().collect();
    if chars.len() <= 10 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 10), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_pan() {
        assert_eq!(mask_pan("4111111111111111"), "411111******1111");
        assert_eq!(mask_pan("1234567890"), "**********");
        assert_eq!(mask_pan(""), "");
    }

    #[test]
    fn test_sensitive_string_debug_is_masked() {
        let pan = SensitiveString::new("4111111111111111");
        let debug = format!("{:?}", pan);
        assert!(!debug.contains("4111111111111111"));
        assert!(debug.contains("411111******1111"));
        assert_eq!(pan.to_string(), "411111******1111");
    }

    proptest::proptest! {
        #[test]
        fn prop_mask_keeps_length_and_hides_middle(pan in "[0-9]{11,19}") {
            let masked = mask_pan(&pan);
            proptest::prop_assert_eq!(masked.len(), pan.len());
            proptest::prop_assert_eq!(&masked[..6], &pan[..6]);
            proptest::prop_assert_eq!(&masked[pan.len() - 4..], &pan[pan.len() - 4..]);
            proptest::prop_assert!(masked[6..pan.len() - 4].chars().all(|c| c == '*'));
        }
    }
}
