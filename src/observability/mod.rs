//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured log records)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Records:
//!     → logging.rs (level filter, active sink, atomic swap)
//!     → format.rs (JSON / console line encoding)
//!     → non-blocking worker thread (tracing-appender)
//!     → rotation.rs (size-rotated file with count/age retention)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Every record carries its call site
//! - Metrics are cheap (atomic increments)

pub mod format;
pub mod logging;
pub mod metrics;
pub mod rotation;

pub use logging::{init, parse_level, LogError, Logger};
