//! Config reload supervisor.
//!
//! The supervisor task is the single owner of the running generation
//! (selection, fingerprint, server handle). Everything else talks to it
//! through [`Command`]s and observes it through a `watch` receiver.
//!
//! # Reload sequence
//! ```text
//! Idle ──Reload──▶ Reloading
//!     load file       ── error ─────────────▶ Idle (generation untouched)
//!     select proxy    ── error ─────────────▶ Idle (generation untouched)
//!     fingerprint     ── unchanged ─────────▶ Idle
//!     stop old, bind + start new, publish ──▶ Idle
//! ```

use std::path::PathBuf;

use tokio::sync::{mpsc, watch};

use crate::config::{load_config, ActiveSelection, Fingerprint};
use crate::http::server::{ServerError, ServerHandle, ServerInstance};
use crate::lifecycle::generation::{GenerationInfo, GenerationState};
use crate::net::listener::BindRetry;

/// Messages accepted by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Re-read the configuration file and apply it if routing changed.
    Reload,
    /// Stop the live generation and exit.
    Shutdown,
}

/// Result of one reload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new generation with this id is live.
    Applied(u64),
    /// Routing fields are unchanged; nothing restarted.
    Unchanged,
    /// The file could not be used; the live generation keeps running.
    Rejected(String),
}

/// The live generation as owned by the supervisor.
struct Generation {
    selection: ActiveSelection,
    fingerprint: Fingerprint,
    handle: ServerHandle,
}

impl Generation {
    fn info(&self) -> GenerationInfo {
        GenerationInfo {
            id: self.handle.id(),
            listen_addr: self.handle.local_addr(),
            proxy_addr: self.selection.proxy.address(),
            fingerprint: self.fingerprint,
        }
    }
}

pub struct Supervisor {
    config_path: PathBuf,
    bind_retry: BindRetry,
    current: Generation,
    published: watch::Sender<GenerationInfo>,
}

impl Supervisor {
    /// Bind and start generation 1 for `selection`.
    ///
    /// Returns the supervisor and a receiver tracking the live generation.
    pub async fn start(
        config_path: PathBuf,
        selection: ActiveSelection,
        bind_retry: BindRetry,
    ) -> Result<(Self, watch::Receiver<GenerationInfo>), ServerError> {
        let current = launch_generation(1, selection, bind_retry).await?;
        let (published, rx) = watch::channel(current.info());
        Ok((
            Self {
                config_path,
                bind_retry,
                current,
                published,
            },
            rx,
        ))
    }

    /// Process commands until `Shutdown` or until every sender is gone.
    ///
    /// Only a failed bind of a replacement generation is returned as an error.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Result<(), ServerError> {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Reload => {
                    if let Err(e) = self.reload().await {
                        tracing::error!(error = %e, "Failed to start new generation");
                        return Err(e);
                    }
                }
                Command::Shutdown => break,
            }
        }

        let handle = &self.current.handle;
        tracing::info!(generation = handle.id(), "Stopping server");
        handle.stop();
        handle.wait_for(GenerationState::Stopped).await;
        Ok(())
    }

    /// One pass of the reload state machine.
    pub async fn reload(&mut self) -> Result<ReloadOutcome, ServerError> {
        let config = match load_config(&self.config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Reload skipped, keeping current configuration");
                return Ok(ReloadOutcome::Rejected(e.to_string()));
            }
        };

        let selection = match ActiveSelection::from_config(&config) {
            Ok(selection) => selection,
            Err(e) => {
                tracing::warn!(error = %e, "Reload skipped, keeping current configuration");
                return Ok(ReloadOutcome::Rejected(e.to_string()));
            }
        };

        let fingerprint = Fingerprint::of(&selection);
        if fingerprint == self.current.fingerprint {
            tracing::info!(version = %config.version, "No change in proxy configuration");
            return Ok(ReloadOutcome::Unchanged);
        }

        let next_id = self.current.handle.id() + 1;
        tracing::info!(
            from = self.current.handle.id(),
            to = next_id,
            dialer = %selection.dialer.address(),
            proxy = %selection.proxy.address(),
            "Proxy configuration changed, restarting server"
        );

        // The old listener closes as soon as its accept loop sees the stop;
        // the new bind retries while the address is still held.
        self.current.handle.stop();
        self.current = launch_generation(next_id, selection, self.bind_retry).await?;
        self.published.send_replace(self.current.info());

        Ok(ReloadOutcome::Applied(next_id))
    }
}

async fn launch_generation(
    id: u64,
    selection: ActiveSelection,
    bind_retry: BindRetry,
) -> Result<Generation, ServerError> {
    let instance = ServerInstance::bind(id, &selection, bind_retry).await?;
    let handle = instance.handle();
    tokio::spawn(instance.start());
    handle.wait_for(GenerationState::Running).await;

    Ok(Generation {
        fingerprint: Fingerprint::of(&selection),
        selection,
        handle,
    })
}
