use crate::components::TokenHandle;
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
#[cfg(windows)]
use tokio::signal::windows::{ctrl_break, ctrl_c};

/// Resolves once a termination signal arrives and background actors are stopped
pub async fn shutdown_signal(token_handle: Option<TokenHandle>) {
    // Wait for a termination signal
    wait_for_signal().await;

    // Shut down the token actor
    if let Some(handle) = token_handle {
        if let Err(e) = handle.shutdown().await {
            error!("Error shutting down token actor: {:?}", e);
        } else {
            info!("Token actor shut down successfully");
        }
    }

    info!("Draining in-flight requests");
}

/// Platform-specific signal handling implementation
#[cfg(unix)]
async fn wait_for_signal() {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to install signal handlers: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM signal, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT signal, initiating graceful shutdown");
        }
    }
}

/// Platform-specific signal handling implementation
#[cfg(windows)]
async fn wait_for_signal() {
    let (mut ctrlc, mut ctrlbreak) = match (ctrl_c(), ctrl_break()) {
        (Ok(c), Ok(b)) => (c, b),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to install signal handlers: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = ctrlc.recv() => {
            info!("Received Ctrl+C signal, initiating graceful shutdown");
        }
        _ = ctrlbreak.recv() => {
            info!("Received Ctrl+Break signal, initiating graceful shutdown");
        }
    }
}
