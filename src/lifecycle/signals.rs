//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGTERM/SIGINT (Ctrl+C)
//! - Race them against a programmatic [`Shutdown`] request
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that cannot be installed is logged and ignored; the other
//!   sources still work

use crate::lifecycle::Shutdown;

/// Why the application left the running state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    Interrupt,
    Terminate,
    Requested,
}

/// Wait for an external termination signal or a programmatic stop request.
pub async fn wait_for_termination(shutdown: &Shutdown) -> Termination {
    let reason = tokio::select! {
        _ = ctrl_c() => Termination::Interrupt,
        _ = terminate() => Termination::Terminate,
        _ = shutdown.wait() => Termination::Requested,
    };
    tracing::info!(reason = ?reason, "Shutdown signal received");
    reason
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
