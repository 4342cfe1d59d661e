//! Environment-variable configuration store

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::store::ConfigStore;

/// Store exposing environment variables as a flat JSON object
///
/// Options:
/// - `raw-data` (bool, default false): keep every value a string instead of
///   coercing `true`/`false` and numeric strings to their scalar types
/// - `keys` (array of strings): restrict to the listed variables
///
/// The environment is captured on the first fetch and cached; the process
/// environment is not expected to change underneath a running retriever.
#[derive(Debug)]
pub struct EnvStore {
    raw_data: bool,
    keys: Option<HashSet<String>>,
    cached: OnceLock<Vec<u8>>,
}

impl EnvStore {
    /// Create a store over the whole environment
    pub fn new() -> Self {
        Self {
            raw_data: false,
            keys: None,
            cached: OnceLock::new(),
        }
    }

    /// Create a store from a descriptor options tree
    pub fn from_config(config: &Value) -> Self {
        let raw_data = config
            .get("raw-data")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let keys = config.get("keys").and_then(Value::as_array).map(|keys| {
            keys.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        });
        Self {
            raw_data,
            keys,
            cached: OnceLock::new(),
        }
    }

    fn snapshot(&self) -> Vec<u8> {
        let mut tree = Map::new();
        for (key, value) in std::env::vars() {
            if let Some(keys) = &self.keys
                && !keys.contains(&key)
            {
                continue;
            }
            let value = if self.raw_data {
                Value::String(value)
            } else {
                coerce(&value)
            };
            tree.insert(key, value);
        }
        serde_json::to_vec(&Value::Object(tree)).unwrap_or_default()
    }
}

impl Default for EnvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for EnvStore {
    async fn fetch(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.cached.get_or_init(|| self.snapshot()).clone())
    }
}

/// Coerce an environment value to the scalar it spells
///
/// Booleans and numbers become typed scalars; everything else stays a
/// string.
fn coerce(value: &str) -> Value {
    match value {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = value.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Ok(float) = value.parse::<f64>()
        && let Some(number) = serde_json::Number::from_f64(float)
    {
        return Value::Number(number);
    }
    Value::String(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce() {
        assert_eq!(coerce("true"), json!(true));
        assert_eq!(coerce("8080"), json!(8080));
        assert_eq!(coerce("0.5"), json!(0.5));
        assert_eq!(coerce("hello"), json!("hello"));
        assert_eq!(coerce("10h"), json!("10h"));
    }

    #[tokio::test]
    async fn test_keys_whitelist() {
        // PATH is present in any reasonable test environment
        let store = EnvStore::from_config(&json!({"keys": ["PATH"], "raw-data": true}));
        let bytes = store.fetch().await.unwrap();
        let tree: Value = serde_json::from_slice(&bytes).unwrap();

        let object = tree.as_object().unwrap();
        assert!(object.contains_key("PATH"));
        assert_eq!(object.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_cached() {
        let store = EnvStore::new();
        let first = store.fetch().await.unwrap();
        let second = store.fetch().await.unwrap();
        assert_eq!(first, second);
    }
}
