//! TOML format processor for the conflux configuration retriever
//!
//! Register [`TomlProcessor`] to let store descriptors declare
//! `format = "toml"` (or point a file store at a `.toml` path):
//!
//! ```
//! use conflux_core::ProcessorRegistry;
//!
//! let mut registry = ProcessorRegistry::with_defaults();
//! conflux_toml::register(&mut registry);
//! assert!(registry.get("toml").is_ok());
//! ```

use conflux_core::{ConfigProcessor, ProcessorRegistry};
use serde_json::Value;

/// Processor decoding TOML payloads into configuration trees
#[derive(Debug)]
pub struct TomlProcessor;

impl ConfigProcessor for TomlProcessor {
    fn name(&self) -> &str {
        "toml"
    }

    fn decode(&self, _options: &Value, bytes: &[u8]) -> anyhow::Result<Value> {
        let text = std::str::from_utf8(bytes)?;
        Ok(toml::from_str(text)?)
    }
}

/// Register the TOML processor
pub fn register(registry: &mut ProcessorRegistry) {
    registry.register(TomlProcessor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_tables_and_scalars() {
        let payload = br#"
host = "0.0.0.0"

[server]
port = 8080
tls = false
"#;
        let tree = TomlProcessor.decode(&json!({}), payload).unwrap();
        assert_eq!(
            tree,
            json!({"host": "0.0.0.0", "server": {"port": 8080, "tls": false}})
        );
    }

    #[test]
    fn test_decode_empty_payload() {
        let tree = TomlProcessor.decode(&json!({}), b"").unwrap();
        assert_eq!(tree, json!({}));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(TomlProcessor.decode(&json!({}), b"server = ").is_err());
    }
}
