//! In-memory reference connector.
//!
//! Records live in a sharded concurrent map. Cloud-flavored connectors are
//! this same implementation with a different [`BackendKind`]; only their
//! labels and backend-specific metrics differ.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

use crate::connector::{build_metrics, BackendKind, Metrics, VaultConnector};
use crate::record::{EncryptedTokenData, TokenMetadata};
use tokenvault_common::{Error, Result};

/// In-memory vault connector.
///
/// All data is held in process memory and lost on drop.
pub struct MemoryConnector {
    kind: BackendKind,
    labels: BTreeMap<String, String>,
    records: DashMap<String, EncryptedTokenData>,
    initialized: AtomicBool,
    stores: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryConnector {
    /// Create a reference connector.
    pub fn new() -> Self {
        Self::with_backend(BackendKind::Memory)
    }

    /// Create a connector reporting the given backend identity.
    pub fn with_backend(kind: BackendKind) -> Self {
        Self {
            kind,
            labels: BTreeMap::new(),
            records: DashMap::new(),
            initialized: AtomicBool::new(false),
            stores: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    /// Attach a backend-specific label, reported as `<backend>.<key>`.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Backend identity of this connector.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::NotInitialized {
                backend: self.kind.label().to_string(),
            })
        }
    }

    fn validate_token_id(token_id: &str) -> Result<()> {
        if token_id.trim().is_empty() {
            return Err(Error::ValidationFailure(
                "token id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VaultConnector for MemoryConnector {
    fn backend(&self) -> &str {
        self.kind.label()
    }

    async fn initialize(&self) -> Result<()> {
        if !self.initialized.swap(true, Ordering::AcqRel) {
            info!(
                backend = %self.kind,
                service = self.kind.service(),
                "Vault connector initialized"
            );
        }
        Ok(())
    }

    async fn store(&self, mut record: EncryptedTokenData, metadata: TokenMetadata) -> Result<()> {
        self.ensure_initialized()?;
        Self::validate_token_id(&record.token_id)?;

        record.metadata.extend(metadata);
        let now = Utc::now();

        match self.records.entry(record.token_id.clone()) {
            Entry::Occupied(mut existing) => {
                record.created_at = existing.get().created_at;
                record.version = existing.get().version + 1;
                record.updated_at = now;
                existing.insert(record);
            }
            Entry::Vacant(slot) => {
                record.version = 1;
                record.updated_at = now;
                slot.insert(record);
            }
        }

        self.stores.fetch_add(1, Ordering::Relaxed);
        debug!(backend = %self.kind, "Stored token record");
        Ok(())
    }

    async fn retrieve(&self, token_id: &str) -> Result<EncryptedTokenData> {
        self.ensure_initialized()?;

        self.records
            .get(token_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(format!("token record {}", token_id)))
    }

    async fn delete(&self, token_id: &str) -> Result<()> {
        self.ensure_initialized()?;

        if self.records.remove(token_id).is_some() {
            self.deletes.fetch_add(1, Ordering::Relaxed);
            debug!(backend = %self.kind, token_id, "Deleted token record");
        }
        Ok(())
    }

    async fn update_metadata(
        &self,
        token_id: &str,
        metadata: TokenMetadata,
    ) -> Result<EncryptedTokenData> {
        self.ensure_initialized()?;

        let mut entry = self
            .records
            .get_mut(token_id)
            .ok_or_else(|| Error::NotFound(format!("token record {}", token_id)))?;

        let record = entry.value_mut();
        record.metadata.extend(metadata);
        record.updated_at = Utc::now();
        record.version += 1;

        Ok(record.clone())
    }

    async fn token_inventory(&self) -> Result<BTreeSet<String>> {
        self.ensure_initialized()?;
        Ok(self.records.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn token_count(&self) -> Result<usize> {
        self.ensure_initialized()?;
        Ok(self.records.len())
    }

    async fn is_healthy(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    async fn metrics(&self) -> Result<Metrics> {
        self.ensure_initialized()?;

        let prefix = self.kind.label();
        let mut extra: Vec<(String, serde_json::Value)> = vec![
            (format!("{}.service", prefix), self.kind.service().into()),
            (
                format!("{}.store_operations", prefix),
                self.stores.load(Ordering::Relaxed).into(),
            ),
            (
                format!("{}.delete_operations", prefix),
                self.deletes.load(Ordering::Relaxed).into(),
            ),
        ];
        for (key, value) in &self.labels {
            extra.push((format!("{}.{}", prefix, key), value.clone().into()));
        }

        Ok(build_metrics(prefix, self.records.len(), true, extra))
    }
}
