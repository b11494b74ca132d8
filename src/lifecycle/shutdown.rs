//! Shutdown coordination.
//!
//! # Responsibilities
//! - Carry the cancellation token handed to the listener and background tasks
//! - Bound the drain of in-flight requests by a deadline

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long in-flight requests get to finish once draining starts.
pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// Coordinator for graceful shutdown.
///
/// Clones share one token; triggering any clone wakes every waiter,
/// including ones that start waiting after the trigger.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the signal has been triggered.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }
}

/// Result of waiting for the listener to drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight request finished before the deadline.
    Completed,
    /// The deadline elapsed first; the listener task was aborted.
    DeadlineExceeded,
    /// The listener task ended with an error or panicked.
    Failed(String),
}

impl fmt::Display for DrainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrainOutcome::Completed => f.write_str("completed"),
            DrainOutcome::DeadlineExceeded => f.write_str("deadline exceeded"),
            DrainOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Wait up to `deadline` for an already-signalled server task to finish.
pub async fn drain(server: &mut JoinHandle<io::Result<()>>, deadline: Duration) -> DrainOutcome {
    match tokio::time::timeout(deadline, &mut *server).await {
        Ok(Ok(Ok(()))) => DrainOutcome::Completed,
        Ok(Ok(Err(e))) => DrainOutcome::Failed(e.to_string()),
        Ok(Err(join)) => DrainOutcome::Failed(join.to_string()),
        Err(_) => {
            server.abort();
            DrainOutcome::DeadlineExceeded
        }
    }
}
