//! Retry with exponential backoff for transient vault failures.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::connector::{Metrics, VaultConnector};
use crate::record::{EncryptedTokenData, TokenMetadata};
use tokenvault_common::{Error, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay (cap for exponential growth).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);

        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            // +/- 25%
            let jitter_factor = 0.75 + (rand::random::<f64>() * 0.5);
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Runs an operation until it succeeds, fails permanently, or exhausts its
/// retries. Only transient errors are retried.
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub async fn execute<F, Fut, T>(&self, operation: &'static str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(operation, retries = attempt, "Vault call succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if !err.is_transient() {
                        return Err(err);
                    }

                    attempt += 1;
                    if attempt > self.config.max_retries {
                        warn!(
                            operation,
                            attempts = attempt,
                            error = %err,
                            "Vault call failed after retries"
                        );
                        return Err(err);
                    }

                    let delay = self.config.delay_for_attempt(attempt - 1);
                    warn!(
                        operation,
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Vault call failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Connector decorator retrying idempotent operations on transient errors.
///
/// Store is an upsert and delete tolerates absent ids, so every operation
/// of the contract is safe to repeat.
pub struct RetryingConnector {
    inner: Arc<dyn VaultConnector>,
    executor: RetryExecutor,
}

impl RetryingConnector {
    pub fn new(inner: Arc<dyn VaultConnector>, config: RetryConfig) -> Self {
        Self {
            inner,
            executor: RetryExecutor::new(config),
        }
    }
}

#[async_trait]
impl VaultConnector for RetryingConnector {
    fn backend(&self) -> &str {
        self.inner.backend()
    }

    async fn initialize(&self) -> Result<()> {
        self.executor
            .execute("initialize", || self.inner.initialize())
            .await
    }

    async fn store(&self, record: EncryptedTokenData, metadata: TokenMetadata) -> Result<()> {
        self.executor
            .execute("store", || {
                self.inner.store(record.clone(), metadata.clone())
            })
            .await
    }

    async fn retrieve(&self, token_id: &str) -> Result<EncryptedTokenData> {
        self.executor
            .execute("retrieve", || self.inner.retrieve(token_id))
            .await
    }

    async fn delete(&self, token_id: &str) -> Result<()> {
        self.executor
            .execute("delete", || self.inner.delete(token_id))
            .await
    }

    async fn update_metadata(
        &self,
        token_id: &str,
        metadata: TokenMetadata,
    ) -> Result<EncryptedTokenData> {
        self.executor
            .execute("update_metadata", || {
                self.inner.update_metadata(token_id, metadata.clone())
            })
            .await
    }

    async fn token_inventory(&self) -> Result<BTreeSet<String>> {
        self.executor
            .execute("token_inventory", || self.inner.token_inventory())
            .await
    }

    async fn token_count(&self) -> Result<usize> {
        self.executor
            .execute("token_count", || self.inner.token_count())
            .await
    }

    async fn is_healthy(&self) -> bool {
        self.inner.is_healthy().await
    }

    async fn metrics(&self) -> Result<Metrics> {
        self.inner.metrics().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnector;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig::new(max_retries)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false)
    }

    #[test]
    fn test_retry_config_delay_calculation() {
        let config = RetryConfig::new(3)
            .with_initial_delay(Duration::from_secs(1))
            .with_backoff_multiplier(2.0)
            .with_max_delay(Duration::from_secs(60))
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn test_max_delay_cap() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(10))
            .with_backoff_multiplier(10.0)
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_transient_error_is_retried() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let executor = RetryExecutor::new(fast(3));

        let result: Result<i32> = executor
            .execute("store", move || async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::storage("aws", "store", "throttled"))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let executor = RetryExecutor::new(fast(3));

        let result: Result<i32> = executor
            .execute("retrieve", move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::NotFound("tok".to_string()))
            })
            .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_max_retries_exceeded() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let executor = RetryExecutor::new(fast(2));

        let result: Result<i32> = executor
            .execute("delete", move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::storage("gcp", "delete", "unavailable"))
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        // Initial + 2 retries
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    /// Fails the first `failures` stores with a storage error.
    struct FlakyConnector {
        inner: MemoryConnector,
        failures: AtomicU32,
    }

    #[async_trait]
    impl VaultConnector for FlakyConnector {
        fn backend(&self) -> &str {
            "flaky"
        }

        async fn initialize(&self) -> Result<()> {
            self.inner.initialize().await
        }

        async fn store(&self, record: EncryptedTokenData, metadata: TokenMetadata) -> Result<()> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(Error::storage("flaky", "store", "connection reset"));
            }
            self.inner.store(record, metadata).await
        }

        async fn retrieve(&self, token_id: &str) -> Result<EncryptedTokenData> {
            self.inner.retrieve(token_id).await
        }

        async fn delete(&self, token_id: &str) -> Result<()> {
            self.inner.delete(token_id).await
        }

        async fn update_metadata(
            &self,
            token_id: &str,
            metadata: TokenMetadata,
        ) -> Result<EncryptedTokenData> {
            self.inner.update_metadata(token_id, metadata).await
        }

        async fn token_inventory(&self) -> Result<BTreeSet<String>> {
            self.inner.token_inventory().await
        }

        async fn token_count(&self) -> Result<usize> {
            self.inner.token_count().await
        }

        async fn is_healthy(&self) -> bool {
            self.inner.is_healthy().await
        }

        async fn metrics(&self) -> Result<Metrics> {
            self.inner.metrics().await
        }
    }

    #[tokio::test]
    async fn test_connector_recovers_from_flaky_store() {
        let flaky = FlakyConnector {
            inner: MemoryConnector::new(),
            failures: AtomicU32::new(2),
        };
        let connector = RetryingConnector::new(Arc::new(flaky), fast(3));
        connector.initialize().await.unwrap();

        connector
            .store(
                EncryptedTokenData::new("tok", vec![1]).with_metadata("merchantId", "M1"),
                TokenMetadata::new(),
            )
            .await
            .unwrap();

        let record = connector.retrieve("tok").await.unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.metadata["merchantId"], "M1");
    }

    #[tokio::test]
    async fn test_connector_gives_up() {
        let flaky = FlakyConnector {
            inner: MemoryConnector::new(),
            failures: AtomicU32::new(10),
        };
        let connector = RetryingConnector::new(Arc::new(flaky), fast(1));
        connector.initialize().await.unwrap();

        let result = connector
            .store(EncryptedTokenData::new("tok", vec![1]), TokenMetadata::new())
            .await;
        assert!(matches!(result, Err(Error::Storage { .. })));
        assert!(matches!(
            connector.retrieve("tok").await,
            Err(Error::NotFound(_))
        ));
    }
}
