//! External resource clients.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Connector::connect (store, then cache)
//!     → Arc<dyn Resource> recorded in ResourceSet (acquisition order)
//!
//! Shutdown:
//!     ResourceSet::release → Resource::close in reverse order
//! ```
//!
//! # Design Decisions
//! - Handles are pooled and shared with request handlers via `Arc`
//! - `close` is idempotent; a closed handle fails `ping`
//! - Release drains the set, so a second release does nothing

pub mod cache;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BoxError;

pub use cache::{RedisCache, RedisConnector};
pub use store::{MySqlConnector, MySqlStore};

/// An opened, shareable connection to an external system.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Name used in logs and health reports.
    fn name(&self) -> &str;

    /// Round-trip to the backing system.
    async fn ping(&self) -> Result<(), BoxError>;

    /// Release the underlying connections. Safe to call more than once.
    async fn close(&self);
}

/// Factory for a [`Resource`], run once during startup.
#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn connect(&self) -> Result<Arc<dyn Resource>, BoxError>;
}

/// Acquired resources, in acquisition order.
#[derive(Default)]
pub struct ResourceSet {
    handles: Vec<Arc<dyn Resource>>,
}

impl std::fmt::Debug for ResourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handles.iter().map(|h| h.name()))
            .finish()
    }
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly acquired handle.
    pub fn push(&mut self, handle: Arc<dyn Resource>) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Shared handles for request handlers, in acquisition order.
    pub fn handles(&self) -> Vec<Arc<dyn Resource>> {
        self.handles.clone()
    }

    /// Look up a handle by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Resource>> {
        self.handles.iter().find(|h| h.name() == name).cloned()
    }

    /// Close every handle in reverse acquisition order.
    ///
    /// Returns the names in the order they were released. Calling this again
    /// returns an empty list.
    pub async fn release(&mut self) -> Vec<String> {
        let mut released = Vec::with_capacity(self.handles.len());
        while let Some(handle) = self.handles.pop() {
            handle.close().await;
            tracing::info!(resource = handle.name(), "Resource released");
            released.push(handle.name().to_string());
        }
        released
    }
}
