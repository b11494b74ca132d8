//! Redis cache client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use url::Url;

use crate::config::CacheConfig;
use crate::error::BoxError;
use crate::resources::{Connector, Resource};

/// Opens the Redis connection during startup.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    config: CacheConfig,
}

impl RedisConnector {
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// `redis://[:password@]host:port/db`
    pub fn url(&self) -> Result<Url, BoxError> {
        let mut url = Url::parse(&format!(
            "redis://{}:{}/{}",
            self.config.host, self.config.port, self.config.db
        ))?;
        if !self.config.password.is_empty() {
            url.set_password(Some(&self.config.password))
                .map_err(|()| "cache password cannot be encoded in a URL")?;
        }
        Ok(url)
    }
}

#[async_trait]
impl Connector for RedisConnector {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn connect(&self) -> Result<Arc<dyn Resource>, BoxError> {
        let client = redis::Client::open(self.url()?.as_str())?;
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);

        let mut connection =
            tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
                .await
                .map_err(|_| format!("cache connect timed out after {timeout:?}"))??;
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;

        Ok(Arc::new(RedisCache::new(connection)))
    }
}

/// Multiplexed Redis handle; clones of the connection share one socket.
pub struct RedisCache {
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisCache {
    pub fn new(connection: MultiplexedConnection) -> Self {
        Self {
            connection: Mutex::new(Some(connection)),
        }
    }

    /// A connection for issuing commands, or `None` once closed.
    pub async fn connection(&self) -> Option<MultiplexedConnection> {
        self.connection.lock().await.clone()
    }
}

#[async_trait]
impl Resource for RedisCache {
    fn name(&self) -> &str {
        "cache"
    }

    async fn ping(&self) -> Result<(), BoxError> {
        let mut connection = self.connection().await.ok_or("cache is closed")?;
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        Ok(())
    }

    async fn close(&self) {
        // Dropping the last clone closes the socket.
        self.connection.lock().await.take();
    }
}
