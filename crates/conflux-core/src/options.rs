//! Store descriptors and retriever options
//!
//! A [`StoreOptions`] describes one configuration source: its store type,
//! the format of its payload, free-form options handed to the store factory,
//! and whether a fetch failure is tolerated. The ordered list of descriptors
//! in [`RetrieverOptions`] defines merge precedence: later stores override
//! earlier ones on conflicting keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::processor::format_from_extension;

/// Default scan period when none is configured
pub const DEFAULT_SCAN_PERIOD: Duration = Duration::from_secs(5);

/// Environment variable naming a default configuration file to include when
/// [`RetrieverOptions::include_default_stores`] is set
pub const CONFIG_PATH_ENV: &str = "CONFLUX_CONFIG_PATH";

/// Descriptor for one configuration source
///
/// Immutable once the retriever is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Store type, looked up in the [`StoreRegistry`](crate::StoreRegistry)
    #[serde(rename = "type")]
    pub store_type: String,
    /// Payload format, looked up in the
    /// [`ProcessorRegistry`](crate::ProcessorRegistry). When absent it is
    /// inferred from the `path` option's file extension, defaulting to json.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Free-form options handed to the store factory and the processor
    #[serde(default = "empty_object")]
    pub config: Value,
    /// Whether a fetch failure is tolerated (substituted with an empty tree)
    #[serde(default)]
    pub optional: bool,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl StoreOptions {
    /// Create a descriptor for the given store type
    pub fn new(store_type: impl Into<String>) -> Self {
        Self {
            store_type: store_type.into(),
            format: None,
            config: empty_object(),
            optional: false,
        }
    }

    /// Set the payload format explicitly
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Replace the free-form options tree
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Set a single entry in the options tree
    ///
    /// A `config` that is not an object is replaced with an empty one first.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if !self.config.is_object() {
            self.config = empty_object();
        }
        if let Value::Object(map) = &mut self.config {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Mark this source as optional: a fetch failure yields an empty tree
    /// instead of failing the scan
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// The effective format for this descriptor
    ///
    /// Explicit format wins; otherwise file-like sources infer it from the
    /// `path` option's extension; everything else defaults to json.
    pub fn effective_format(&self) -> String {
        if let Some(format) = &self.format {
            return format.clone();
        }
        self.config
            .get("path")
            .and_then(Value::as_str)
            .map_or_else(|| "json".to_string(), format_from_extension)
    }
}

/// Options for building a [`ConfigRetriever`](crate::ConfigRetriever)
#[derive(Debug, Clone)]
pub struct RetrieverOptions {
    /// Ordered list of store descriptors; order defines merge precedence
    pub stores: Vec<StoreOptions>,
    /// Period between automatic scans. Zero disables the timer; only
    /// on-demand scans occur.
    pub scan_period: Duration,
    /// Prepend the default stores (environment variables, plus the file
    /// named by `CONFLUX_CONFIG_PATH` when set) before the configured ones
    pub include_default_stores: bool,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            stores: Vec::new(),
            scan_period: DEFAULT_SCAN_PERIOD,
            include_default_stores: false,
        }
    }
}

impl RetrieverOptions {
    /// The full ordered descriptor list, with default stores prepended when
    /// requested. Configured stores come last so they win merge conflicts.
    pub(crate) fn effective_stores(&self) -> Vec<StoreOptions> {
        let mut stores = Vec::new();
        if self.include_default_stores {
            stores.push(StoreOptions::new("env").optional());
            if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
                && !path.trim().is_empty()
            {
                stores.push(
                    StoreOptions::new("file")
                        .with_option("path", path.trim())
                        .optional(),
                );
            }
        }
        stores.extend(self.stores.iter().cloned());
        stores
    }
}
