//! The store capability and its registry
//!
//! A store fetches the raw bytes of one configuration source. Stores are
//! created once when the retriever is built, reused across scans, and closed
//! exactly once at teardown. Factories are registered explicitly in a
//! [`StoreRegistry`]; there is no runtime discovery.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::processor::ProcessorRegistry;
use crate::{ConfigError, Result};

/// Capability contract for fetching raw configuration bytes
#[async_trait]
pub trait ConfigStore: Send + Sync + std::fmt::Debug {
    /// Fetch the current payload of this source
    async fn fetch(&self) -> anyhow::Result<Vec<u8>>;

    /// Release any resources held by this store
    ///
    /// Best-effort and idempotent; called exactly once by the retriever at
    /// teardown. The default implementation does nothing.
    async fn close(&self) {}
}

/// Factory building a store from the descriptor's free-form options tree
///
/// The processor registry is passed along for stores that decode payloads
/// themselves instead of handing bytes to a single processor (the directory
/// store decodes one file per fileset); most factories ignore it.
pub type StoreFactory = Arc<
    dyn Fn(&Value, &ProcessorRegistry) -> anyhow::Result<Box<dyn ConfigStore>> + Send + Sync,
>;

/// Explicit registration table mapping store type names to factories
///
/// Populated at startup by whichever adapters are compiled in. An empty
/// registry is valid; [`StoreRegistry::with_defaults`] registers the
/// built-in stores of this crate.
#[derive(Clone, Default)]
pub struct StoreRegistry {
    factories: HashMap<String, StoreFactory>,
}

impl StoreRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in stores registered:
    /// `file`, `directory`, `json`, `env`, and `http`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::stores::register_defaults(&mut registry);
        registry
    }

    /// Register a factory for a store type, replacing any previous one
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn(&Value, &ProcessorRegistry) -> anyhow::Result<Box<dyn ConfigStore>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(type_name.into(), Arc::new(factory));
    }

    /// Whether a factory is registered for the given type
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// The registered type names, sorted for stable error messages
    pub fn known_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build a store for the given type and options
    pub fn create(
        &self,
        type_name: &str,
        config: &Value,
        processors: &ProcessorRegistry,
    ) -> Result<Box<dyn ConfigStore>> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| ConfigError::UnknownStoreType {
                type_name: type_name.to_string(),
                known: self.known_types().join(", "),
            })?;
        factory(config, processors).map_err(|e| ConfigError::StoreConfig {
            store: type_name.to_string(),
            reason: format!("{e:#}"),
        })
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("types", &self.known_types())
            .finish()
    }
}
