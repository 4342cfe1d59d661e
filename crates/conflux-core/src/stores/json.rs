//! Inline JSON configuration store

use async_trait::async_trait;
use serde_json::Value;

use crate::store::ConfigStore;

/// Store serving the descriptor's own options tree as its payload
///
/// Useful for wiring static configuration (defaults, deployment descriptors)
/// into the same merge pipeline as live sources.
#[derive(Debug)]
pub struct JsonStore {
    config: Value,
}

impl JsonStore {
    /// Create a store serving the given tree
    pub fn new(config: Value) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConfigStore for JsonStore {
    async fn fetch(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.config)?)
    }
}
