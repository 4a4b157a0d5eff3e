//! Common utilities and types shared across TokenVault modules.
//!
//! This module provides the error taxonomy, the sensitive-value wrappers
//! and the process configuration used by every other crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::{SecretSettings, TokenVaultConfig, TransportSettings, VaultSettings};
pub use error::{Error, Result};
pub use types::{mask_pan, SensitiveString};
