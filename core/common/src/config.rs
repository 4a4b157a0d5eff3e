//! Process configuration.
//!
//! Loaded from JSON with environment overrides. The master key itself is
//! never part of this structure; only the location it is read from.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Error, Result};

/// Environment variable toggling transport encryption.
pub const ENV_TRANSPORT_ENABLED: &str = "TOKENVAULT_TRANSPORT_ENABLED";

/// Environment variable holding comma-separated excluded path patterns.
pub const ENV_EXCLUDED_PATHS: &str = "TOKENVAULT_EXCLUDED_PATHS";

/// Default environment variable holding the base64 master key.
pub const DEFAULT_MASTER_KEY_ENV: &str = "TOKENVAULT_MASTER_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenVaultConfig {
    pub transport: TransportSettings,
    pub vault: VaultSettings,
    pub secrets: SecretSettings,
}

/// Transport envelope settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Global switch for envelope encryption.
    pub enabled: bool,
    /// Ordered path patterns that bypass the envelope filter.
    ///
    /// An entry ending in `*` matches by prefix; any other entry must
    /// match the request path exactly.
    pub excluded_paths: Vec<String>,
    /// Upper bound on request and response bodies buffered by the filter.
    pub max_body_bytes: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            excluded_paths: vec!["/health".to_string()],
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl TransportSettings {
    /// Check whether a request path is excluded from envelope processing.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|pattern| {
            match pattern.strip_suffix('*') {
                Some(prefix) => path.starts_with(prefix),
                None => path == pattern,
            }
        })
    }
}

/// Vault connector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Registered backend name ("memory", "aws", "azure", "gcp").
    pub backend: String,
    /// Backend-specific configuration passed to the connector factory.
    pub backend_config: serde_json::Value,
    /// Deadline applied to every connector call.
    pub operation_timeout_ms: u64,
    /// Retry attempts for idempotent operations after a storage error.
    pub max_retries: u32,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            backend_config: serde_json::Value::Null,
            operation_timeout_ms: 5_000,
            max_retries: 3,
        }
    }
}

/// Location of the master key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretSettings {
    /// Environment variable holding the base64-encoded master key.
    pub master_key_env: String,
    /// File holding the base64-encoded master key; takes precedence.
    pub master_key_file: Option<PathBuf>,
}

impl Default for SecretSettings {
    fn default() -> Self {
        Self {
            master_key_env: DEFAULT_MASTER_KEY_ENV.to_string(),
            master_key_file: None,
        }
    }
}

impl TokenVaultConfig {
    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_json(&contents)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    /// - Returns error if the enabled flag is not a boolean
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TRANSPORT_ENABLED) {
            self.transport.enabled = parse_bool(&raw).ok_or_else(|| {
                Error::Config(format!(
                    "{} must be true or false, got '{}'",
                    ENV_TRANSPORT_ENABLED, raw
                ))
            })?;
        }

        if let Some(raw) = lookup(ENV_EXCLUDED_PATHS) {
            self.transport.excluded_paths = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TokenVaultConfig::default();
        assert!(!config.transport.enabled);
        assert_eq!(config.vault.backend, "memory");
        assert_eq!(config.secrets.master_key_env, DEFAULT_MASTER_KEY_ENV);
    }

    #[test]
    fn test_exact_and_wildcard_exclusions() {
        let settings = TransportSettings {
            excluded_paths: vec!["/health".to_string(), "/public/*".to_string()],
            ..Default::default()
        };

        assert!(settings.is_excluded("/health"));
        assert!(!settings.is_excluded("/health/deep"));
        assert!(settings.is_excluded("/public/"));
        assert!(settings.is_excluded("/public/docs/index"));
        assert!(!settings.is_excluded("/api/tokens"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            TokenVaultConfig::from_json(r#"{"transport": {"enabled": true}}"#).unwrap();
        assert!(config.transport.enabled);
        assert_eq!(config.transport.excluded_paths, vec!["/health".to_string()]);
        assert_eq!(config.vault.operation_timeout_ms, 5_000);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_TRANSPORT_ENABLED, "yes"),
            (ENV_EXCLUDED_PATHS, "/health, /metrics/* ,"),
        ]
        .into_iter()
        .collect();

        let mut config = TokenVaultConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert!(config.transport.enabled);
        assert_eq!(
            config.transport.excluded_paths,
            vec!["/health".to_string(), "/metrics/*".to_string()]
        );
    }

    #[test]
    fn test_invalid_bool_override_fails() {
        let mut config = TokenVaultConfig::default();
        let result = config.apply_overrides(|name| {
            (name == ENV_TRANSPORT_ENABLED).then(|| "maybe".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"vault": {{"backend": "aws", "operation_timeout_ms": 250}}}}"#
        )
        .unwrap();

        let config = TokenVaultConfig::from_file(file.path()).unwrap();
        assert_eq!(config.vault.backend, "aws");
        assert_eq!(config.vault.operation_timeout_ms, 250);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = TokenVaultConfig::from_file(Path::new("/nonexistent/tokenvault.json"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = TokenVaultConfig::default();
        let json = config.to_json().unwrap();
        let restored = TokenVaultConfig::from_json(&json).unwrap();
        assert_eq!(restored.vault.backend, config.vault.backend);
        assert_eq!(restored.transport.max_body_bytes, config.transport.max_body_bytes);
    }
}
