//! Token values and algorithm identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use tokenvault_common::Error;

/// Surrogate value produced by a tokenization strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub(crate) fn new(value: String) -> Self {
        Self(value)
    }

    /// Get the token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Routing identifier of a tokenization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlgorithmType {
    /// Random single-use token.
    Simple,
    /// Deterministic card-on-file token.
    Cof,
    /// Format-preserving, Luhn-valid token.
    Fpe,
}

impl AlgorithmType {
    /// All known algorithm types.
    pub const ALL: [AlgorithmType; 3] = [Self::Simple, Self::Cof, Self::Fpe];

    /// Wire name of the algorithm type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "SIMPLE",
            Self::Cof => "COF",
            Self::Fpe => "FPE",
        }
    }
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SIMPLE" => Ok(Self::Simple),
            "COF" => Ok(Self::Cof),
            "FPE" => Ok(Self::Fpe),
            other => Err(Error::InvalidContext(format!(
                "unknown algorithm type '{}'",
                other
            ))),
        }
    }
}
