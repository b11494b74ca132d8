//! Startup and lifecycle error taxonomy.

use thiserror::Error;

use crate::config::ConfigError;
use crate::observability::LogError;

/// Boxed error used at the seams to external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that stop the process from starting or serving.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed configuration value.
    #[error("init settings failed: {0}")]
    Config(#[from] ConfigError),

    /// The logger could not be installed.
    #[error("init logger failed: {0}")]
    Logger(#[from] LogError),

    /// A resource client could not establish a working connection.
    #[error("init {resource} failed: {source}")]
    Connect {
        resource: &'static str,
        #[source]
        source: BoxError,
    },

    /// The listener failed to bind or stopped serving on its own.
    #[error("listen: {0}")]
    Listen(#[source] std::io::Error),
}
