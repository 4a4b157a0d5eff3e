//! Deadline enforcement for connector calls.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::connector::{Metrics, VaultConnector};
use crate::record::{EncryptedTokenData, TokenMetadata};
use tokenvault_common::{Error, Result};

/// Connector decorator that bounds every call by a deadline.
///
/// A call that exceeds the deadline fails with a storage error naming the
/// operation; the underlying future is dropped.
pub struct TimeoutConnector {
    inner: Arc<dyn VaultConnector>,
    deadline: Duration,
}

impl TimeoutConnector {
    pub fn new(inner: Arc<dyn VaultConnector>, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.deadline, future).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    backend = self.inner.backend(),
                    operation,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "Vault call timed out"
                );
                Err(Error::storage(
                    self.inner.backend(),
                    operation,
                    format!("timed out after {}ms", self.deadline.as_millis()),
                ))
            }
        }
    }
}

#[async_trait]
impl VaultConnector for TimeoutConnector {
    fn backend(&self) -> &str {
        self.inner.backend()
    }

    async fn initialize(&self) -> Result<()> {
        self.bounded("initialize", self.inner.initialize()).await
    }

    async fn store(&self, record: EncryptedTokenData, metadata: TokenMetadata) -> Result<()> {
        self.bounded("store", self.inner.store(record, metadata)).await
    }

    async fn retrieve(&self, token_id: &str) -> Result<EncryptedTokenData> {
        self.bounded("retrieve", self.inner.retrieve(token_id)).await
    }

    async fn delete(&self, token_id: &str) -> Result<()> {
        self.bounded("delete", self.inner.delete(token_id)).await
    }

    async fn update_metadata(
        &self,
        token_id: &str,
        metadata: TokenMetadata,
    ) -> Result<EncryptedTokenData> {
        self.bounded("update_metadata", self.inner.update_metadata(token_id, metadata))
            .await
    }

    async fn token_inventory(&self) -> Result<BTreeSet<String>> {
        self.bounded("token_inventory", self.inner.token_inventory())
            .await
    }

    async fn token_count(&self) -> Result<usize> {
        self.bounded("token_count", self.inner.token_count()).await
    }

    async fn is_healthy(&self) -> bool {
        tokio::time::timeout(self.deadline, self.inner.is_healthy())
            .await
            .unwrap_or(false)
    }

    async fn metrics(&self) -> Result<Metrics> {
        self.bounded("metrics", self.inner.metrics()).await
    }
}
