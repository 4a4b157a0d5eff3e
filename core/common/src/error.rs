//! Common error types for TokenVault.
//!
//! Messages carry enough context to diagnose a failure (backend, operation,
//! token id) but never card numbers or key material.

use thiserror::Error;

/// Top-level error type for TokenVault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied insufficient or inconsistent tokenization input.
    #[error("Invalid tokenization context: {0}")]
    InvalidContext(String),

    /// Token failed its strategy's structural check.
    #[error("Token validation failed: {0}")]
    ValidationFailure(String),

    /// Vault operation attempted before `initialize`.
    #[error("Vault connector '{backend}' is not initialized")]
    NotInitialized { backend: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend-specific storage failure.
    #[error("Storage error in '{backend}' during {operation}: {cause}")]
    Storage {
        backend: String,
        operation: String,
        cause: String,
    },

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Configuration missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Build a storage error for the given backend and operation.
    pub fn storage(
        backend: impl Into<String>,
        operation: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self::Storage {
            backend: backend.into(),
            operation: operation.into(),
            cause: cause.into(),
        }
    }

    /// Whether a retry of the same idempotent call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
