//! Process-wide secret material.
//!
//! The master key is loaded once from a configured source and shared by the
//! tokenization engine and the transport envelope filter. There is no
//! fallback key: a missing or malformed source is a startup error.

use once_cell::sync::OnceCell;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroizing;

use crate::keys::{KeyPurpose, MasterKey, SubKey};
use tokenvault_common::{Error, Result, SecretSettings};

static GLOBAL: OnceCell<Arc<SecretMaterial>> = OnceCell::new();

/// Where the base64-encoded master key is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Environment variable name.
    Env(String),
    /// File containing the encoded key.
    File(PathBuf),
}

impl KeySource {
    /// Pick the source described by configuration; a key file wins over
    /// the environment variable.
    pub fn from_settings(settings: &SecretSettings) -> Self {
        match &settings.master_key_file {
            Some(path) => Self::File(path.clone()),
            None => Self::Env(settings.master_key_env.clone()),
        }
    }

    /// Load the master key from this source.
    pub fn load(&self) -> Result<MasterKey> {
        self.load_with(|name| std::env::var(name).ok())
    }

    /// Load the master key, resolving environment variables through `lookup`.
    ///
    /// # Errors
    /// - The variable is unset or empty, or the file cannot be read
    /// - The value is not base64 of exactly 32 bytes
    pub fn load_with<F>(&self, lookup: F) -> Result<MasterKey>
    where
        F: Fn(&str) -> Option<String>,
    {
        let encoded = match self {
            Self::Env(name) => Zeroizing::new(
                lookup(name)
                    .filter(|v| !v.trim().is_empty())
                    .ok_or_else(|| {
                        Error::Config(format!("Master key variable {} is not set", name))
                    })?,
            ),
            Self::File(path) => Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!(
                    "Failed to read master key file {}: {}",
                    path.display(),
                    e
                ))
            })?),
        };

        MasterKey::from_base64(&encoded)
    }
}

/// Master key plus the subkeys expanded from it.
pub struct SecretMaterial {
    master: MasterKey,
    transport: SubKey,
    record: SubKey,
}

impl SecretMaterial {
    /// Build secret material from a master key.
    pub fn new(master: MasterKey) -> Result<Self> {
        let transport = master.derive_subkey(KeyPurpose::Transport)?;
        let record = master.derive_subkey(KeyPurpose::RecordSealing)?;
        Ok(Self {
            master,
            transport,
            record,
        })
    }

    /// Load secret material from a key source.
    pub fn from_source(source: &KeySource) -> Result<Self> {
        Self::new(source.load()?)
    }

    /// The master key (COF merchant derivation).
    pub fn master_key(&self) -> &MasterKey {
        &self.master
    }

    /// AEAD key for the transport envelope.
    pub fn transport_key(&self) -> &SubKey {
        &self.transport
    }

    /// AEAD key for sealing card material into vault records.
    pub fn record_key(&self) -> &SubKey {
        &self.record
    }

    /// Install this material as the process-wide secret.
    ///
    /// # Errors
    /// - Returns error if secret material was already installed
    pub fn install_global(self) -> Result<Arc<Self>> {
        let material = Arc::new(self);
        GLOBAL
            .set(material.clone())
            .map_err(|_| Error::Config("Secret material is already installed".to_string()))?;
        info!("Process secret material installed");
        Ok(material)
    }

    /// The process-wide secret material.
    ///
    /// # Errors
    /// - Returns error if `install_global` has not been called
    pub fn global() -> Result<Arc<Self>> {
        GLOBAL
            .get()
            .cloned()
            .ok_or_else(|| Error::Config("Secret material has not been installed".to_string()))
    }
}

impl fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretMaterial([REDACTED])")
    }
}
