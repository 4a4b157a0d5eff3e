//! Connector registry for resolving a vault backend by name.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::connector::{BackendKind, VaultConnector};
use crate::memory::MemoryConnector;
use crate::retry::{RetryConfig, RetryingConnector};
use crate::timeout::TimeoutConnector;
use tokenvault_common::{Error, Result, VaultSettings};

/// Factory function type for creating connectors.
pub type ConnectorFactory =
    Box<dyn Fn(Value) -> Result<Arc<dyn VaultConnector>> + Send + Sync>;

/// Registry for vault connector factories.
///
/// The backend is chosen by configuration at startup; nothing above the
/// registry branches on which store is in use.
pub struct ConnectorRegistry {
    factories: HashMap<String, ConnectorFactory>,
}

impl ConnectorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a connector factory.
    ///
    /// # Preconditions
    /// - `name` must be unique within the registry
    ///
    /// # Errors
    /// - Returns error if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: ConnectorFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::Config(format!(
                "Connector '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a connector by name and configuration.
    ///
    /// The returned connector is not yet initialized.
    ///
    /// # Errors
    /// - Connector not found
    /// - Configuration invalid
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn VaultConnector>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            Error::NotFound(format!("Connector '{}' is not registered", name))
        })?;
        factory(config)
    }

    /// Resolve the configured backend wrapped with its deadline and retry
    /// policy.
    pub fn resolve_configured(&self, settings: &VaultSettings) -> Result<Arc<dyn VaultConnector>> {
        let connector = self.resolve(&settings.backend, settings.backend_config.clone())?;
        let connector: Arc<dyn VaultConnector> = Arc::new(TimeoutConnector::new(
            connector,
            Duration::from_millis(settings.operation_timeout_ms),
        ));
        if settings.max_retries == 0 {
            return Ok(connector);
        }
        let retry = RetryConfig::new(settings.max_retries)
            .with_initial_delay(Duration::from_millis(50))
            .with_max_delay(Duration::from_secs(2));
        Ok(Arc::new(RetryingConnector::new(connector, retry)))
    }

    /// Get list of registered connector names, sorted.
    pub fn connectors(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a connector is registered.
    pub fn has_connector(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry holding the memory, aws, azure and gcp connectors.
///
/// String fields of the backend config object (region, vault name,
/// project) are reported as backend labels in metrics.
pub fn create_default_registry() -> ConnectorRegistry {
    let mut factories: HashMap<String, ConnectorFactory> = HashMap::new();
    for kind in [
        BackendKind::Memory,
        BackendKind::Aws,
        BackendKind::Azure,
        BackendKind::Gcp,
    ] {
        factories.insert(
            kind.label().to_string(),
            Box::new(move |config: Value| -> Result<Arc<dyn VaultConnector>> {
                Ok(Arc::new(connector_from_config(kind, &config)?))
            }),
        );
    }
    ConnectorRegistry { factories }
}

fn connector_from_config(kind: BackendKind, config: &Value) -> Result<MemoryConnector> {
    let mut connector = MemoryConnector::with_backend(kind);
    match config {
        Value::Null => {}
        Value::Object(fields) => {
            for (key, value) in fields {
                if let Some(text) = value.as_str() {
                    connector = connector.with_label(key.clone(), text);
                }
            }
        }
        _ => {
            return Err(Error::Config(format!(
                "{} backend config must be an object",
                kind
            )))
        }
    }
    Ok(connector)
}
