//! YAML format processor for the conflux configuration retriever
//!
//! Register [`YamlProcessor`] to let store descriptors declare
//! `format = "yaml"` (or point a file store at a `.yaml`/`.yml` path):
//!
//! ```
//! use conflux_core::ProcessorRegistry;
//!
//! let mut registry = ProcessorRegistry::with_defaults();
//! conflux_yaml::register(&mut registry);
//! assert!(registry.get("yaml").is_ok());
//! ```

use conflux_core::{ConfigProcessor, ProcessorRegistry};
use serde_json::Value;

/// Processor decoding YAML payloads into configuration trees
///
/// An empty document decodes to an empty tree so that an empty file behaves
/// like an absent optional source.
#[derive(Debug)]
pub struct YamlProcessor;

impl ConfigProcessor for YamlProcessor {
    fn name(&self) -> &str {
        "yaml"
    }

    fn decode(&self, _options: &Value, bytes: &[u8]) -> anyhow::Result<Value> {
        let tree: Value = serde_yaml::from_slice(bytes)?;
        if tree.is_null() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        Ok(tree)
    }
}

/// Register the YAML processor
pub fn register(registry: &mut ProcessorRegistry) {
    registry.register(YamlProcessor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_mappings_and_sequences() {
        let payload = br#"
server:
  port: 8080
  hosts:
    - a
    - b
debug: true
"#;
        let tree = YamlProcessor.decode(&json!({}), payload).unwrap();
        assert_eq!(
            tree,
            json!({"server": {"port": 8080, "hosts": ["a", "b"]}, "debug": true})
        );
    }

    #[test]
    fn test_decode_empty_document() {
        let tree = YamlProcessor.decode(&json!({}), b"").unwrap();
        assert_eq!(tree, json!({}));
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(YamlProcessor.decode(&json!({}), b"a: [unclosed").is_err());
    }
}
