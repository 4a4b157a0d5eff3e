//! Algorithm registry keyed by algorithm type.
//!
//! The routing policy that decides which strategy a request uses lives with
//! the caller; the registry only resolves a type to its implementation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::algorithm::TokenizationAlgorithm;
use crate::cof::CofTokenizer;
use crate::fpe::FpeTokenizer;
use crate::simple::SimpleTokenizer;
use crate::token::AlgorithmType;
use tokenvault_common::{Error, Result};
use tokenvault_crypto::SecretMaterial;

/// Registry of tokenization strategies.
pub struct AlgorithmRegistry {
    algorithms: HashMap<AlgorithmType, Arc<dyn TokenizationAlgorithm>>,
}

impl AlgorithmRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            algorithms: HashMap::new(),
        }
    }

    /// Create a registry holding the three built-in strategies.
    pub fn with_defaults(secrets: Arc<SecretMaterial>) -> Self {
        let mut algorithms: HashMap<AlgorithmType, Arc<dyn TokenizationAlgorithm>> =
            HashMap::new();
        algorithms.insert(AlgorithmType::Simple, Arc::new(SimpleTokenizer::new()));
        algorithms.insert(AlgorithmType::Cof, Arc::new(CofTokenizer::new(secrets)));
        algorithms.insert(AlgorithmType::Fpe, Arc::new(FpeTokenizer::new()));
        Self { algorithms }
    }

    /// Register a strategy under its own algorithm type.
    ///
    /// # Errors
    /// - Returns error if the type is already registered
    pub fn register(&mut self, algorithm: Arc<dyn TokenizationAlgorithm>) -> Result<()> {
        let kind = algorithm.algorithm_type();
        if self.algorithms.contains_key(&kind) {
            return Err(Error::Config(format!(
                "Algorithm '{}' is already registered",
                kind
            )));
        }
        self.algorithms.insert(kind, algorithm);
        Ok(())
    }

    /// Resolve a strategy by type.
    pub fn resolve(&self, kind: AlgorithmType) -> Result<Arc<dyn TokenizationAlgorithm>> {
        self.algorithms
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Algorithm '{}' is not registered", kind)))
    }

    /// Resolve a strategy by its wire name (`"SIMPLE" | "COF" | "FPE"`).
    pub fn resolve_name(&self, name: &str) -> Result<Arc<dyn TokenizationAlgorithm>> {
        self.resolve(name.parse()?)
    }

    /// Registered algorithm types.
    pub fn algorithm_types(&self) -> Vec<AlgorithmType> {
        let mut kinds: Vec<AlgorithmType> = self.algorithms.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::new()
    }
}
