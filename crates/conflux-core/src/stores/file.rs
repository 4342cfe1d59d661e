//! File-based configuration store

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

use crate::store::ConfigStore;

/// Store reading the payload from a file on every scan
///
/// Options: `path` (required). The payload format is inferred from the
/// path's extension unless the descriptor sets one explicitly.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store from a descriptor options tree
    pub fn from_config(config: &Value) -> anyhow::Result<Self> {
        let path = config
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("the `path` option is required"))?;
        Ok(Self::new(path))
    }
}

#[async_trait]
impl ConfigStore for FileStore {
    async fn fetch(&self) -> anyhow::Result<Vec<u8>> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fetch_reads_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.json");
        std::fs::write(&path, br#"{"a": 1}"#).unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.fetch().await.unwrap(), br#"{"a": 1}"#);
    }

    #[tokio::test]
    async fn test_missing_file_is_a_fetch_error() {
        let store = FileStore::new("/nonexistent/app.json");
        assert!(store.fetch().await.is_err());
    }

    #[test]
    fn test_path_option_is_required() {
        assert!(FileStore::from_config(&serde_json::json!({})).is_err());
    }
}
