//! Application settings.
//!
//! ```text
//! config.yaml | config.toml
//!     → loader.rs      pick a parser by extension, deserialize
//!     → validation.rs  collect every semantic violation
//!     → SharedConfig   current snapshot, swapped whole
//!
//! watcher.rs (notify) → reload → SharedConfig::replace
//! ```
//!
//! Every section defaults, so a file only needs the values it changes. Reloads
//! that fail to parse or validate are logged and dropped.

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

use std::sync::Arc;

use arc_swap::ArcSwap;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, AppSection, CacheConfig, LogConfig, LogFormat, ServerConfig, StoreConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;

/// The current configuration, replaced wholesale on reload.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<ArcSwap<AppConfig>>,
}

impl SharedConfig {
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Snapshot of the configuration in effect right now.
    pub fn current(&self) -> Arc<AppConfig> {
        self.inner.load_full()
    }

    /// Publish a new configuration, returning the one it replaced.
    pub fn replace(&self, config: AppConfig) -> Arc<AppConfig> {
        self.inner.swap(Arc::new(config))
    }
}
