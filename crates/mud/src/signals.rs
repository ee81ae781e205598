//! Signal handling for graceful server shutdown.
//!
//! The first termination signal starts a graceful shutdown; a second one
//! while that is in progress exits the process immediately.

use mud_event_system::ShutdownState;
use tokio::signal;
use tracing::info;

/// Waits for a termination signal and initiates `shutdown_state`.
///
/// Handles SIGINT and SIGTERM on Unix and Ctrl+C on Windows.
pub async fn wait_for_shutdown(
    shutdown_state: &ShutdownState,
) -> Result<(), Box<dyn std::error::Error>> {
    wait_for_signal().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    shutdown_state.initiate_shutdown();
    Ok(())
}

/// Waits for the next termination signal without logging or side effects.
pub async fn wait_for_signal() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}
