//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, pool sizes > 0)
//! - Reject severity levels the logger cannot parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::observability::logging::parse_level;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unrecognized log level {0:?}")]
    LogLevel(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("app.host must not be empty")]
    EmptyHost,

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),

    #[error("{0} must be at most {1}")]
    TooLarge(&'static str, u64),
}

/// Longest log retention accepted, in days.
pub const MAX_LOG_AGE_DAYS: u64 = 100 * 365;

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if parse_level(&config.log.level).is_err() {
        errors.push(ValidationError::LogLevel(config.log.level.clone()));
    }
    if config.app.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("server.request_timeout_secs"));
    }
    if config.server.max_body_size == 0 {
        errors.push(ValidationError::Zero("server.max_body_size"));
    }
    if config.store.max_open_conns == 0 {
        errors.push(ValidationError::Zero("store.max_open_conns"));
    }
    if config.store.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero("store.connect_timeout_secs"));
    }
    if config.cache.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero("cache.connect_timeout_secs"));
    }
    if config.log.max_age > MAX_LOG_AGE_DAYS {
        errors.push(ValidationError::TooLarge("log.max_age", MAX_LOG_AGE_DAYS));
    }
    if config.server.metrics_enabled
        && config.server.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.server.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
