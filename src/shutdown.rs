//! Shutdown signal handling shared by the long-running processes.

use std::io;

#[cfg(unix)]
pub async fn signal_handler() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    // equivalent to Ctrl+C
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM signal, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("received SIGINT signal, initiating graceful shutdown");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn signal_handler() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("received CTRL+C signal, initiating graceful shutdown");
    Ok(())
}
