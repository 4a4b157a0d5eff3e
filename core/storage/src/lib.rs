//! Vault connector abstraction for TokenVault.
//!
//! This module provides a trait-based interface over the store that holds
//! encrypted token records, an in-memory reference connector, and a
//! registry for choosing the backend by configuration.
//!
//! # Design Principles
//! - Backend isolation: no backend-specific logic above the connector
//! - Async operations: every call may suspend on I/O
//! - Unified error semantics: consistent error kinds across backends
//! - Ciphertext only: the vault never sees plaintext card numbers

pub mod connector;
pub mod memory;
pub mod record;
pub mod registry;
pub mod retry;
pub mod timeout;

pub use connector::{
    build_metrics, BackendKind, Metrics, VaultConnector, METRIC_BACKEND_TYPE, METRIC_INITIALIZED,
    METRIC_TOKEN_COUNT,
};
pub use memory::MemoryConnector;
pub use record::{EncryptedTokenData, TokenMetadata};
pub use registry::{create_default_registry, ConnectorFactory, ConnectorRegistry};
pub use retry::{RetryConfig, RetryExecutor, RetryingConnector};
pub use timeout::TimeoutConnector;
