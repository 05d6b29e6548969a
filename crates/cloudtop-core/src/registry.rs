//! Provider registry
//!
//! Maps provider names to constructor functions. Adapter crates expose a
//! `register(&Registry)` function that is called once at startup; after that
//! the registry is only read (`create`, `list`, `exists`), so lookups share a
//! reader lock and never serialize against each other.
//!
//! The registry is an ordinary value rather than process-wide state, so tests
//! can build isolated registries.

use crate::error::{ProviderError, Result};
use crate::traits::Provider;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Zero-argument constructor for an uninitialized provider
pub type Factory = Arc<dyn Fn() -> Box<dyn Provider> + Send + Sync>;

/// Name -> factory mapping
#[derive(Default)]
pub struct Registry {
    factories: RwLock<HashMap<String, Factory>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`.
    ///
    /// Re-registering a name replaces the previous factory.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Provider> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(provider = %name, "Registering provider factory");
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
        factories.insert(name, Arc::new(factory));
    }

    /// Look up the factory for `name`
    pub fn get(&self, name: &str) -> Result<Factory> {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        factories
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::NotRegistered(name.to_string()))
    }

    /// Instantiate a fresh, uninitialized provider.
    pub fn create(&self, name: &str) -> Result<Box<dyn Provider>> {
        // Factory runs outside the lock.
        let factory = self.get(name)?;
        Ok(factory())
    }

    pub fn exists(&self, name: &str) -> bool {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        factories.contains_key(name)
    }

    /// All registered names, sorted
    pub fn list(&self) -> Vec<String> {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("providers", &self.list()).finish()
    }
}
