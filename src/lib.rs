//! Web service scaffold: structured logging with rotation, request telemetry,
//! panic recovery and an ordered startup/shutdown lifecycle.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resources;
pub mod routing;

pub use config::AppConfig;
pub use error::{BoxError, Error};
pub use http::HttpServer;
pub use lifecycle::{Orchestrator, Shutdown, ShutdownReport};
pub use observability::Logger;
