//! Signal handling for graceful shutdown.

use std::future::Future;
use tokio::signal::unix::{SignalKind, signal};

/// Installs the SIGTERM and SIGINT handlers and returns a future that
/// completes when either signal is received.
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, initiating graceful shutdown");
            }
        }
    })
}
