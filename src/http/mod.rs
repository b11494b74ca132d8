//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, graceful shutdown)
//!     → request.rs (request ID)
//!     → telemetry.rs (one record per request)
//!     → recovery.rs (fault containment)
//!     → route aggregate (business handlers returning Result<_, AppError>)
//! ```

pub mod context;
pub mod error;
pub mod recovery;
pub mod request;
pub mod server;
pub mod telemetry;

pub use context::{ErrorScope, RequestContext, RequestErrors};
pub use error::{AppError, Fault, FaultKind};
pub use recovery::Recovery;
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
