//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Application identity and listen address.
    pub app: AppSection,

    /// Structured logger settings.
    pub log: LogConfig,

    /// Relational store connection settings.
    #[serde(alias = "mysql")]
    pub store: StoreConfig,

    /// Cache connection settings.
    #[serde(alias = "redis")]
    pub cache: CacheConfig,

    /// HTTP server behavior.
    pub server: ServerConfig,
}

/// Application identity and listener settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppSection {
    /// Service name, reported in startup logs.
    pub name: String,

    /// Run mode (e.g., "dev", "release").
    pub mode: String,

    /// Service version string.
    pub version: String,

    /// Interface to bind.
    pub host: String,

    /// TCP port to bind (0 picks an ephemeral port).
    pub port: u16,
}

impl AppSection {
    /// The `host:port` pair the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "web_app".to_string(),
            mode: "dev".to_string(),
            version: "v0.1.0".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Record encoding for the log destination.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Tab-separated human readable lines.
    Console,
}

/// Logger configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum severity (trace, debug, info, warn, error).
    pub level: String,

    /// Destination file. Empty writes to stdout.
    pub filename: String,

    /// Rotation threshold in megabytes (0 uses the 100 MB default).
    pub max_size: u64,

    /// Rotated files to keep (0 keeps all).
    pub max_backups: usize,

    /// Days to keep rotated files (0 keeps them regardless of age).
    pub max_age: u64,

    /// Record encoding.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            filename: "web_app.log".to_string(),
            max_size: 200,
            max_backups: 7,
            max_age: 30,
            format: LogFormat::Json,
        }
    }
}

/// MySQL store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,

    /// Upper bound of pooled connections.
    pub max_open_conns: u32,

    /// Time allowed to establish or acquire a connection, in seconds.
    pub connect_timeout_secs: u64,

    /// Idle pooled connections are closed after this many seconds.
    pub idle_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            dbname: "web_app".to_string(),
            max_open_conns: 200,
            connect_timeout_secs: 5,
            idle_timeout_secs: 600,
        }
    }
}

/// Redis cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub password: String,

    /// Logical database selected after connecting.
    pub db: i64,

    /// Time allowed to establish the connection, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
            connect_timeout_secs: 5,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Attach a stack trace to recovered non-benign faults.
    pub stack_traces: bool,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_body_size: 2 * 1024 * 1024, // 2MB
            stack_traces: true,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
