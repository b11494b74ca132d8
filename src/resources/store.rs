//! MySQL store client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use crate::config::StoreConfig;
use crate::error::BoxError;
use crate::resources::{Connector, Resource};

/// Opens the MySQL pool during startup.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    config: StoreConfig,
}

impl MySqlConnector {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .database(&self.config.dbname)
            .charset("utf8mb4");
        if !self.config.password.is_empty() {
            options = options.password(&self.config.password);
        }
        options
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    fn name(&self) -> &'static str {
        "store"
    }

    async fn connect(&self) -> Result<Arc<dyn Resource>, BoxError> {
        // connect_with opens the first connection, which verifies credentials.
        let pool = MySqlPoolOptions::new()
            .max_connections(self.config.max_open_conns)
            .acquire_timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(self.config.idle_timeout_secs))
            .connect_with(self.connect_options())
            .await
            .map_err(|e| {
                tracing::error!(
                    host = %self.config.host,
                    port = self.config.port,
                    error = %e,
                    "connect DB failed"
                );
                e
            })?;

        Ok(Arc::new(MySqlStore::new(pool)))
    }
}

/// Pooled MySQL handle.
#[derive(Debug)]
pub struct MySqlStore {
    pool: MySqlPool,
    closed: AtomicBool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            closed: AtomicBool::new(false),
        }
    }

    /// The underlying pool, for queries.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl Resource for MySqlStore {
    fn name(&self) -> &str {
        "store"
    }

    async fn ping(&self) -> Result<(), BoxError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.pool.close().await;
        }
    }
}
