//! OS signal handling.
//!
//! SIGINT and SIGTERM both request a graceful shutdown. SIGKILL cannot be
//! caught.

use tokio::signal;

/// Which signal ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Interrupt,
    Terminate,
}

/// Resolve on the first SIGINT or SIGTERM.
pub async fn termination() -> Termination {
    let received = tokio::select! {
        _ = ctrl_c() => Termination::Interrupt,
        _ = terminate() => Termination::Terminate,
    };
    tracing::info!(signal = ?received, "Shutdown signal received");
    received
}

async fn ctrl_c() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::warn!(?err, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(err) => {
            tracing::warn!(?err, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
