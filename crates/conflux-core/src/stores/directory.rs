//! Directory store: aggregates files selected by glob patterns

use anyhow::Context;
use async_trait::async_trait;
use glob::Pattern;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::merge::{deep_merge, empty_tree};
use crate::processor::{ConfigProcessor, ProcessorRegistry};
use crate::store::ConfigStore;

/// Store serving the merged content of a directory tree
///
/// The descriptor options name a root `path` and a `filesets` array. Each
/// fileset carries a glob `pattern`, matched against file paths relative to
/// the root, and an optional `format` (default `json`) naming the processor
/// that decodes its files. Matching files are decoded and merged in path
/// order, filesets in declaration order, and the merged tree is served as a
/// JSON payload. A missing root directory yields an empty tree.
///
/// The descriptor's own format stays `json`; set it explicitly when the
/// directory name ends in something extension-like (`conf.d`).
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    filesets: Vec<FileSet>,
}

/// One glob pattern paired with the processor decoding its files
#[derive(Debug)]
struct FileSet {
    pattern: Pattern,
    processor: Arc<dyn ConfigProcessor>,
    options: Value,
}

impl DirectoryStore {
    /// Build a store from descriptor options
    ///
    /// Requires a `path` option naming a directory (not a file) and a
    /// non-empty `filesets` array whose entries each carry a `pattern`.
    pub fn from_config(config: &Value, processors: &ProcessorRegistry) -> anyhow::Result<Self> {
        let root = config
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("the `path` option is required"))?;
        let root = PathBuf::from(root);
        anyhow::ensure!(
            !root.is_file(),
            "the `path` option must name a directory, not a file"
        );

        let sets = config
            .get("filesets")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow::anyhow!("the `filesets` option is required"))?;
        anyhow::ensure!(!sets.is_empty(), "at least one fileset is required");

        let mut filesets = Vec::with_capacity(sets.len());
        for set in sets {
            let pattern = set
                .get("pattern")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("each fileset needs a `pattern`"))?;
            let format = set.get("format").and_then(Value::as_str).unwrap_or("json");
            filesets.push(FileSet {
                pattern: Pattern::new(pattern)
                    .with_context(|| format!("invalid fileset pattern `{pattern}`"))?,
                processor: processors.get(format)?,
                options: set.clone(),
            });
        }
        Ok(Self { root, filesets })
    }
}

#[async_trait]
impl ConfigStore for DirectoryStore {
    async fn fetch(&self) -> anyhow::Result<Vec<u8>> {
        let files = relative_files(&self.root).await?;
        let mut merged = empty_tree();
        for set in &self.filesets {
            for relative in &files {
                if !set.pattern.matches(&relative.to_string_lossy()) {
                    continue;
                }
                let path = self.root.join(relative);
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("reading `{}`", path.display()))?;
                let tree = set
                    .processor
                    .decode(&set.options, &bytes)
                    .with_context(|| format!("decoding `{}`", path.display()))?;
                anyhow::ensure!(
                    tree.is_object(),
                    "`{}` does not hold a top-level object",
                    path.display()
                );
                deep_merge(&mut merged, tree);
            }
        }
        Ok(serde_json::to_vec(&merged)?)
    }
}

/// All files under `root`, as sorted root-relative paths
///
/// Sorting makes the merge order within a fileset stable across platforms.
/// A root that does not exist or is not a directory yields an empty list.
async fn relative_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => {}
        _ => return Ok(files),
    }

    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("listing `{}`", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                pending.push(entry.path());
            } else if let Ok(relative) = entry.path().strip_prefix(root) {
                files.push(relative.to_path_buf());
            }
        }
    }
    files.sort_unstable();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(config: Value) -> DirectoryStore {
        DirectoryStore::from_config(&config, &ProcessorRegistry::with_defaults()).unwrap()
    }

    async fn fetch_tree(store: &DirectoryStore) -> Value {
        serde_json::from_slice(&store.fetch().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_merges_matching_files_in_path_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"x": 1, "y": 1}"#).unwrap();
        std::fs::write(dir.path().join("b.json"), r#"{"y": 2}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not configuration").unwrap();

        let store = store(json!({
            "path": dir.path().to_str().unwrap(),
            "filesets": [{"pattern": "*.json"}]
        }));
        assert_eq!(fetch_tree(&store).await, json!({"x": 1, "y": 2}));
    }

    #[tokio::test]
    async fn test_later_fileset_overrides_earlier_one() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("base")).unwrap();
        std::fs::create_dir(dir.path().join("site")).unwrap();
        std::fs::write(dir.path().join("base/app.json"), r#"{"port": 80, "tls": false}"#).unwrap();
        std::fs::write(dir.path().join("site/app.json"), r#"{"port": 8443}"#).unwrap();

        let store = store(json!({
            "path": dir.path().to_str().unwrap(),
            "filesets": [
                {"pattern": "base/*.json"},
                {"pattern": "site/*.json"},
            ]
        }));
        assert_eq!(fetch_tree(&store).await, json!({"port": 8443, "tls": false}));
    }

    #[tokio::test]
    async fn test_missing_root_yields_empty_tree() {
        let dir = TempDir::new().unwrap();
        let store = store(json!({
            "path": dir.path().join("absent").to_str().unwrap(),
            "filesets": [{"pattern": "*.json"}]
        }));
        assert_eq!(fetch_tree(&store).await, json!({}));
    }

    #[tokio::test]
    async fn test_undecodable_matching_file_fails_the_fetch() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{broken").unwrap();

        let store = store(json!({
            "path": dir.path().to_str().unwrap(),
            "filesets": [{"pattern": "*.json"}]
        }));
        assert!(store.fetch().await.is_err());
    }

    #[test]
    fn test_path_must_not_be_a_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.json");
        std::fs::write(&file, "{}").unwrap();

        let err = DirectoryStore::from_config(
            &json!({"path": file.to_str().unwrap(), "filesets": [{"pattern": "*"}]}),
            &ProcessorRegistry::with_defaults(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not a file"));
    }

    #[test]
    fn test_fileset_requires_a_pattern() {
        let err = DirectoryStore::from_config(
            &json!({"path": "conf", "filesets": [{"format": "json"}]}),
            &ProcessorRegistry::with_defaults(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("pattern"));
    }

    #[test]
    fn test_unknown_fileset_format_is_rejected() {
        let err = DirectoryStore::from_config(
            &json!({"path": "conf", "filesets": [{"pattern": "*", "format": "hocon"}]}),
            &ProcessorRegistry::with_defaults(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("hocon"));
    }
}
