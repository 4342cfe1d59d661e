//! The processor capability and its registry
//!
//! A processor turns the raw bytes fetched by a store into a structured
//! configuration tree, given a format name. Processors are stateless and
//! shared; they are looked up by name in an explicitly constructed
//! [`ProcessorRegistry`] when the retriever is built.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{ConfigError, Result};

/// Capability contract for decoding raw bytes into a configuration tree
pub trait ConfigProcessor: Send + Sync + std::fmt::Debug {
    /// The format name this processor handles (e.g. `json`, `yaml`)
    fn name(&self) -> &str;

    /// Decode the payload into a tree
    ///
    /// `options` is the descriptor's free-form options tree, for processors
    /// that need extra settings (the `raw` processor reads its key from it).
    fn decode(&self, options: &Value, bytes: &[u8]) -> anyhow::Result<Value>;
}

/// Explicit registration table mapping format names to processors
///
/// [`ProcessorRegistry::with_defaults`] registers the `json` and `raw`
/// processors; format crates (yaml, toml) register theirs on top.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn ConfigProcessor>>,
}

impl ProcessorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `json` and `raw` processors registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(JsonProcessor);
        registry.register(RawProcessor);
        registry
    }

    /// Register a processor under its own name, replacing any previous one
    pub fn register(&mut self, processor: impl ConfigProcessor + 'static) {
        self.processors
            .insert(processor.name().to_string(), Arc::new(processor));
    }

    /// Look up a processor by format name
    pub fn get(&self, format: &str) -> Result<Arc<dyn ConfigProcessor>> {
        self.processors
            .get(format)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownFormat {
                format: format.to_string(),
                supported: self.supported_formats().join(", "),
            })
    }

    /// The registered format names, sorted for stable error messages
    pub fn supported_formats(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("formats", &self.supported_formats())
            .finish()
    }
}

/// Infer a format name from a file path's extension
///
/// `.yml` is normalized to `yaml`; a missing or empty extension (including
/// dotfile names) defaults to `json`; anything else maps to the lowercased
/// extension.
pub fn format_from_extension(path: &str) -> String {
    let ext = match std::path::Path::new(path).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.trim().is_empty() => ext.trim().to_lowercase(),
        _ => return "json".to_string(),
    };
    if ext == "yml" { "yaml".to_string() } else { ext }
}

/// Built-in processor for JSON payloads
///
/// An empty payload decodes to an empty tree so that an empty file behaves
/// like an absent optional source.
#[derive(Debug)]
pub struct JsonProcessor;

impl ConfigProcessor for JsonProcessor {
    fn name(&self) -> &str {
        "json"
    }

    fn decode(&self, _options: &Value, bytes: &[u8]) -> anyhow::Result<Value> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Built-in processor wrapping an unparsed payload under a configured key
///
/// Options:
/// - `raw.key` (required): the key the payload is stored under
/// - `raw.type`: `string` (default), `json-object`, or `json-array`
#[derive(Debug)]
pub struct RawProcessor;

impl ConfigProcessor for RawProcessor {
    fn name(&self) -> &str {
        "raw"
    }

    fn decode(&self, options: &Value, bytes: &[u8]) -> anyhow::Result<Value> {
        let key = options
            .get("raw.key")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                anyhow::anyhow!("the `raw.key` option is required when using the `raw` format")
            })?;
        let raw_type = options
            .get("raw.type")
            .and_then(Value::as_str)
            .unwrap_or("string");

        let value = match raw_type {
            "string" => Value::String(String::from_utf8(bytes.to_vec())?),
            "json-object" => {
                let value: Value = serde_json::from_slice(bytes)?;
                anyhow::ensure!(value.is_object(), "payload is not a JSON object");
                value
            }
            "json-array" => {
                let value: Value = serde_json::from_slice(bytes)?;
                anyhow::ensure!(value.is_array(), "payload is not a JSON array");
                value
            }
            other => anyhow::bail!("unrecognized `raw.type`: {other}"),
        };

        let mut tree = serde_json::Map::new();
        tree.insert(key.to_string(), value);
        Ok(Value::Object(tree))
    }
}
