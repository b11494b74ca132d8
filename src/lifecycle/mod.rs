//! Process lifecycle.
//!
//! ```text
//! startup.rs   validate config → logger → store → cache → routes → listener
//! signals.rs   SIGINT | SIGTERM
//! shutdown.rs  stop accepting → drain within SHUTDOWN_DEADLINE
//! startup.rs   release cache, then store → terminated
//! ```
//!
//! [`LifecycleState`] only moves forward. Requests still running when the
//! deadline passes are abandoned.

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use shutdown::{DrainOutcome, Shutdown, SHUTDOWN_DEADLINE};
pub use signals::{termination, Termination};
pub use startup::{Orchestrator, Running, ShutdownReport};
pub use state::{Lifecycle, LifecycleState};
