//! OS signal handling.
//!
//! - SIGINT (Ctrl+C): first press begins graceful teardown, second forces exit
//! - SIGHUP (Unix): immediate config reload, bypassing the debounce window

use tokio::sync::mpsc;

use crate::lifecycle::supervisor::Command;

/// Resolve on the next Ctrl+C.
pub async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Turn every SIGHUP into a reload command until the supervisor goes away.
#[cfg(unix)]
pub async fn forward_hangups(commands: mpsc::Sender<Command>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "SIGHUP reload unavailable");
            return;
        }
    };

    while hangups.recv().await.is_some() {
        tracing::info!("SIGHUP received, reloading configuration");
        if commands.send(Command::Reload).await.is_err() {
            break;
        }
    }
}

#[cfg(not(unix))]
pub async fn forward_hangups(_commands: mpsc::Sender<Command>) {}
