//! Per-source retrieval: fetch, failure policy, decode
//!
//! A [`ConfigProvider`] binds one resolved store to one resolved processor.
//! During a scan every provider is queried concurrently; each yields either
//! a decoded tree or the error that fails the scan.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::merge::empty_tree;
use crate::processor::ConfigProcessor;
use crate::store::ConfigStore;
use crate::{ConfigError, Result};

/// One configuration source, resolved and ready to scan
pub(crate) struct ConfigProvider {
    /// Label used in logs and error messages (the descriptor's store type)
    name: String,
    store: Box<dyn ConfigStore>,
    processor: Arc<dyn ConfigProcessor>,
    /// Descriptor options, handed to the processor on every decode
    options: Value,
    optional: bool,
}

impl ConfigProvider {
    pub(crate) fn new(
        name: String,
        store: Box<dyn ConfigStore>,
        processor: Arc<dyn ConfigProcessor>,
        options: Value,
        optional: bool,
    ) -> Self {
        Self {
            name,
            store,
            processor,
            options,
            optional,
        }
    }

    /// Fetch and decode this source's current tree
    ///
    /// A fetch failure on an optional source is recovered as an empty tree.
    /// A decode failure is always fatal: bytes that cannot be parsed are a
    /// configuration defect, not an absence. The decoded tree must be an
    /// object at the top level.
    pub(crate) async fn get(&self) -> Result<Value> {
        let bytes = match self.store.fetch().await {
            Ok(bytes) => bytes,
            Err(cause) if self.optional => {
                debug!(store = %self.name, "optional source unavailable: {cause:#}");
                return Ok(empty_tree());
            }
            Err(cause) => return Err(ConfigError::fetch(&self.name, &cause)),
        };

        let tree = self
            .processor
            .decode(&self.options, &bytes)
            .map_err(|cause| ConfigError::decode(&self.name, self.processor.name(), &cause))?;

        if !tree.is_object() {
            return Err(ConfigError::Decode {
                store: self.name.clone(),
                format: self.processor.name().to_string(),
                reason: "top-level configuration value must be an object".to_string(),
            });
        }
        Ok(tree)
    }

    /// Close the underlying store (best-effort)
    pub(crate) async fn close(&self) {
        self.store.close().await;
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}
