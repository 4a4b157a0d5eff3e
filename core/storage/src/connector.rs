//! Vault connector trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::record::{EncryptedTokenData, TokenMetadata};
use tokenvault_common::{Error, Result};

/// Metrics snapshot reported by a connector.
pub type Metrics = BTreeMap<String, serde_json::Value>;

/// Required metric: number of stored records.
pub const METRIC_TOKEN_COUNT: &str = "token_count";

/// Required metric: backend type tag.
pub const METRIC_BACKEND_TYPE: &str = "backend_type";

/// Required metric: whether `initialize` has completed.
pub const METRIC_INITIALIZED: &str = "initialized";

/// Identity of the store behind a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local reference store.
    Memory,
    /// AWS-hosted vault.
    Aws,
    /// Azure-hosted vault.
    Azure,
    /// GCP-hosted vault.
    Gcp,
}

impl BackendKind {
    /// Short label used in errors, logs and metric prefixes.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
        }
    }

    /// Managed service the backend represents.
    pub fn service(&self) -> &'static str {
        match self {
            Self::Memory => "in-process",
            Self::Aws => "aws-secrets-manager",
            Self::Azure => "azure-key-vault",
            Self::Gcp => "gcp-secret-manager",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "aws" => Ok(Self::Aws),
            "azure" => Ok(Self::Azure),
            "gcp" => Ok(Self::Gcp),
            other => Err(Error::Config(format!("unknown vault backend '{}'", other))),
        }
    }
}

/// Uniform storage contract for encrypted token records.
///
/// Every operation except `initialize` and `is_healthy` fails with
/// `NotInitialized` until `initialize` has completed. All implementations
/// expose the same semantics, so callers never branch on the backend.
#[async_trait]
pub trait VaultConnector: Send + Sync {
    /// Backend label used in errors and metrics.
    fn backend(&self) -> &str;

    /// Prepare the backend. Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Upsert a record, merging `metadata` into it.
    ///
    /// # Postconditions
    /// - The write is atomic per token id
    /// - `created_at` of an existing record is preserved
    ///
    /// # Errors
    /// - `NotInitialized`
    /// - `StorageError` on backend failure
    async fn store(&self, record: EncryptedTokenData, metadata: TokenMetadata) -> Result<()>;

    /// Fetch a record.
    ///
    /// # Errors
    /// - `NotFound` if no record exists for `token_id`
    async fn retrieve(&self, token_id: &str) -> Result<EncryptedTokenData>;

    /// Remove a record. Deleting an absent id succeeds.
    async fn delete(&self, token_id: &str) -> Result<()>;

    /// Merge metadata into an existing record and return the result.
    ///
    /// # Errors
    /// - `NotFound` if no record exists for `token_id`
    async fn update_metadata(
        &self,
        token_id: &str,
        metadata: TokenMetadata,
    ) -> Result<EncryptedTokenData>;

    /// Every stored token id, without duplicates.
    ///
    /// May be stale with respect to writes that race the enumeration.
    async fn token_inventory(&self) -> Result<BTreeSet<String>>;

    /// Number of stored records.
    async fn token_count(&self) -> Result<usize>;

    /// Liveness: initialized and able to serve requests.
    async fn is_healthy(&self) -> bool;

    /// Metrics snapshot containing at least the required keys.
    async fn metrics(&self) -> Result<Metrics>;
}

/// Build a metrics map with the required keys, then add `extra` entries
/// that do not collide with them.
pub fn build_metrics(
    backend: &str,
    token_count: usize,
    initialized: bool,
    extra: impl IntoIterator<Item = (String, serde_json::Value)>,
) -> Metrics {
    let mut metrics = Metrics::new();
    for (key, value) in extra {
        if !is_required_metric(&key) {
            metrics.insert(key, value);
        }
    }
    metrics.insert(METRIC_TOKEN_COUNT.to_string(), token_count.into());
    metrics.insert(METRIC_BACKEND_TYPE.to_string(), backend.into());
    metrics.insert(METRIC_INITIALIZED.to_string(), initialized.into());
    metrics
}

fn is_required_metric(key: &str) -> bool {
    matches!(
        key,
        METRIC_TOKEN_COUNT | METRIC_BACKEND_TYPE | METRIC_INITIALIZED
    )
}
