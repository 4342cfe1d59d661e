//! Built-in configuration stores
//!
//! Simple adapters with no backend protocol of their own:
//! - `file`: reads a file from disk
//! - `directory`: merges glob-selected files under a directory
//! - `json`: serves an inline tree from the descriptor options
//! - `env`: environment variables as a flat object
//! - `http`: fetches a URL

mod directory;
mod env;
mod file;
mod http;
mod json;

pub use directory::DirectoryStore;
pub use env::EnvStore;
pub use file::FileStore;
pub use http::HttpStore;
pub use json::JsonStore;

use crate::store::{ConfigStore, StoreRegistry};

/// Register the built-in stores under their conventional type names
pub fn register_defaults(registry: &mut StoreRegistry) {
    registry.register("file", |config, _| {
        Ok(Box::new(FileStore::from_config(config)?) as Box<dyn ConfigStore>)
    });
    registry.register("directory", |config, processors| {
        Ok(Box::new(DirectoryStore::from_config(config, processors)?) as Box<dyn ConfigStore>)
    });
    registry.register("json", |config, _| {
        Ok(Box::new(JsonStore::new(config.clone())) as Box<dyn ConfigStore>)
    });
    registry.register("env", |config, _| {
        Ok(Box::new(EnvStore::from_config(config)) as Box<dyn ConfigStore>)
    });
    registry.register("http", |config, _| {
        Ok(Box::new(HttpStore::from_config(config)?) as Box<dyn ConfigStore>)
    });
}
