//! Live multi-source configuration retrieval for async Rust
//!
//! This crate assembles one structured configuration snapshot from an ordered
//! list of heterogeneous sources, keeps it live by periodic re-scanning,
//! detects real changes, and notifies interested consumers:
//! - Fetches from every store concurrently, merges in declaration order
//! - Tolerates failures of sources marked optional
//! - Coalesces overlapping scan requests into a single pipeline execution
//! - Broadcasts change events to listeners and a continuous stream view
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      ConfigRetriever                        │
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐               │
//! │  │ Store #0  │  │ Store #1  │  │ Store #n  │   (parallel)  │
//! │  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘               │
//! │        │   decode     │   decode     │   decode            │
//! │        └──────────────┴──────┬───────┘                     │
//! │                        ┌─────▼─────┐                       │
//! │                        │   Merge   │  (declaration order)  │
//! │                        └─────┬─────┘                       │
//! │                        ┌─────▼─────┐                       │
//! │                        │  Compare  │──▶ cache + notify     │
//! │                        └───────────┘                       │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stores and processors are capability contracts: the engine only knows
//! "fetch bytes" ([`ConfigStore`]) and "decode bytes into a tree"
//! ([`ConfigProcessor`]). Both are resolved from explicit registries when the
//! retriever is built, so unknown types or formats fail construction rather
//! than a scan at 3am.

pub mod events;
pub mod merge;
pub mod options;
pub mod processor;
pub mod provider;
pub mod retriever;
pub mod store;
pub mod stores;

// Re-export main types
pub use events::{ConfigChange, ListenerHandle};
pub use options::{RetrieverOptions, StoreOptions};
pub use processor::{ConfigProcessor, ProcessorRegistry};
pub use retriever::{ConfigRetriever, ConfigRetrieverBuilder};
pub use store::{ConfigStore, StoreRegistry};

/// Error types for configuration operations
///
/// `Clone` so a single scan failure can be handed to every caller coalesced
/// onto that scan.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A non-optional store failed to fetch its payload
    #[error("store `{store}` failed to fetch configuration: {reason}")]
    Fetch { store: String, reason: String },

    /// A payload could not be decoded into a configuration tree.
    /// Always fatal to the scan, even for optional sources: bytes that do
    /// not parse indicate a configuration defect, not an absence.
    #[error("failed to decode configuration from `{store}` as `{format}`: {reason}")]
    Decode {
        store: String,
        format: String,
        reason: String,
    },

    /// A store descriptor named a type no factory is registered for
    #[error("unknown configuration store type `{type_name}` (known types: {known})")]
    UnknownStoreType { type_name: String, known: String },

    /// A store descriptor named a format no processor is registered for
    #[error("unknown configuration format `{format}` (supported formats: {supported})")]
    UnknownFormat { format: String, supported: String },

    /// A store factory rejected its options
    #[error("invalid configuration for store `{store}`: {reason}")]
    StoreConfig { store: String, reason: String },

    /// Operation attempted after the retriever was closed
    #[error("the configuration retriever has been closed")]
    Closed,
}

impl ConfigError {
    pub(crate) fn fetch(store: impl Into<String>, cause: &anyhow::Error) -> Self {
        Self::Fetch {
            store: store.into(),
            reason: format!("{cause:#}"),
        }
    }

    pub(crate) fn decode(
        store: impl Into<String>,
        format: impl Into<String>,
        cause: &anyhow::Error,
    ) -> Self {
        Self::Decode {
            store: store.into(),
            format: format.into(),
            reason: format!("{cause:#}"),
        }
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
