//! End-to-end retrieval of YAML files through the full pipeline

use conflux_core::{ConfigRetriever, ProcessorRegistry, StoreOptions};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

fn processors() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::with_defaults();
    conflux_yaml::register(&mut registry);
    registry
}

#[tokio::test]
async fn yaml_file_format_is_inferred_from_extension() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.yml");
    std::fs::write(&path, "server:\n  port: 8080\n").unwrap();

    let retriever = ConfigRetriever::builder()
        .processor_registry(processors())
        .add_store(StoreOptions::new("file").with_option("path", path.to_str().unwrap()))
        .scan_period(Duration::ZERO)
        .build()
        .unwrap();

    let config = retriever.get_config().await.unwrap();
    assert_eq!(config, json!({"server": {"port": 8080}}));
    retriever.close().await;
}

#[tokio::test]
async fn later_yaml_source_overrides_earlier_json_source() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("override.yaml");
    std::fs::write(&path, "server:\n  port: 9090\n").unwrap();

    let retriever = ConfigRetriever::builder()
        .processor_registry(processors())
        .add_store(
            StoreOptions::new("json").with_config(json!({"server": {"port": 8080, "tls": false}})),
        )
        .add_store(StoreOptions::new("file").with_option("path", path.to_str().unwrap()))
        .scan_period(Duration::ZERO)
        .build()
        .unwrap();

    let config = retriever.get_config().await.unwrap();
    assert_eq!(config, json!({"server": {"port": 9090, "tls": false}}));
    retriever.close().await;
}

#[tokio::test]
async fn directory_store_decodes_yaml_filesets() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir(temp_dir.path().join("conf")).unwrap();
    std::fs::write(temp_dir.path().join("conf/base.json"), r#"{"a": 1, "b": 1}"#).unwrap();
    std::fs::write(temp_dir.path().join("conf/site.yaml"), "b: 2\n").unwrap();

    let retriever = ConfigRetriever::builder()
        .processor_registry(processors())
        .add_store(
            StoreOptions::new("directory")
                .with_option("path", temp_dir.path().to_str().unwrap())
                .with_option(
                    "filesets",
                    json!([
                        {"pattern": "conf/*.json"},
                        {"pattern": "conf/*.yaml", "format": "yaml"},
                    ]),
                ),
        )
        .scan_period(Duration::ZERO)
        .build()
        .unwrap();

    let config = retriever.get_config().await.unwrap();
    assert_eq!(config, json!({"a": 1, "b": 2}));
    retriever.close().await;
}

#[tokio::test]
async fn rescan_picks_up_rewritten_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("live.yaml");
    std::fs::write(&path, "mode: initial\n").unwrap();

    let retriever = ConfigRetriever::builder()
        .processor_registry(processors())
        .add_store(StoreOptions::new("file").with_option("path", path.to_str().unwrap()))
        .scan_period(Duration::ZERO)
        .build()
        .unwrap();

    assert_eq!(
        retriever.get_config().await.unwrap(),
        json!({"mode": "initial"})
    );

    std::fs::write(&path, "mode: updated\n").unwrap();
    assert_eq!(
        retriever.get_config().await.unwrap(),
        json!({"mode": "updated"})
    );
    retriever.close().await;
}
