//! Process-level composition: startup, reload wiring and teardown.
//!
//! # Startup order
//! ```text
//! load config → select proxy → start file watcher → bind generation 1
//!     → spawn supervisor → spawn debouncer
//! ```
//! Any startup failure is fatal and returned to the caller. Nothing is
//! bound until every fallible step before the bind has succeeded.

use std::path::PathBuf;
use std::time::Duration;

use notify::RecommendedWatcher;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};

use crate::config::watcher::{debounce, ConfigWatcher, DEBOUNCE_WINDOW};
use crate::config::{load_config, ActiveSelection, ConfigError, Configuration, SelectionError};
use crate::http::server::ServerError;
use crate::lifecycle::generation::GenerationInfo;
use crate::lifecycle::supervisor::{Command, Supervisor};
use crate::net::listener::BindRetry;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("failed to watch configuration: {0}")]
    Watch(#[from] notify::Error),
}

/// Why a running relay stopped on its own.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("supervisor task died: {0}")]
    Supervisor(#[from] JoinError),
}

/// Startup knobs. Defaults match production behaviour.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Watch the configuration file for changes.
    pub watch: bool,
    pub debounce: Duration,
    pub bind_retry: BindRetry,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            watch: true,
            debounce: DEBOUNCE_WINDOW,
            bind_retry: BindRetry::default(),
        }
    }
}

/// Running relay: the supervisor task plus its inputs.
pub struct Controller {
    commands: mpsc::Sender<Command>,
    generation: watch::Receiver<GenerationInfo>,
    supervisor: Option<JoinHandle<Result<(), ServerError>>>,
    _watcher: Option<RecommendedWatcher>,
}

impl Controller {
    pub async fn launch(config_path: PathBuf) -> Result<Self, StartupError> {
        Self::launch_with(config_path, LaunchOptions::default()).await
    }

    pub async fn launch_with(
        config_path: PathBuf,
        options: LaunchOptions,
    ) -> Result<Self, StartupError> {
        tracing::info!(path = ?config_path, "Loading configuration");
        let config = load_config(&config_path)?;
        Self::start(config_path, &config, options).await
    }

    async fn start(
        config_path: PathBuf,
        config: &Configuration,
        options: LaunchOptions,
    ) -> Result<Self, StartupError> {
        let selection = ActiveSelection::from_config(config)?;

        // Events seen before the supervisor runs stay queued in `events`.
        let (watcher, events) = if options.watch {
            let (watcher, events) = ConfigWatcher::new(&config_path);
            (Some(watcher.run()?), Some(events))
        } else {
            (None, None)
        };

        let (supervisor, generation) =
            Supervisor::start(config_path, selection, options.bind_retry).await?;

        let (commands, command_rx) = mpsc::channel(16);
        if let Some(events) = events {
            tokio::spawn(debounce(events, commands.clone(), options.debounce));
        }
        let supervisor = tokio::spawn(supervisor.run(command_rx));

        Ok(Self {
            commands,
            generation,
            supervisor: Some(supervisor),
            _watcher: watcher,
        })
    }

    /// Observe the live generation.
    pub fn generation(&self) -> watch::Receiver<GenerationInfo> {
        self.generation.clone()
    }

    /// Sender for out-of-band commands (e.g. SIGHUP reloads).
    pub fn commands(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    /// Request a reload now, bypassing the debounce window.
    pub async fn reload(&self) {
        let _ = self.commands.send(Command::Reload).await;
    }

    /// Resolve when the supervisor exits: a fatal restart failure, a
    /// panic, or a completed shutdown.
    ///
    /// Cancel-safe: dropping the future keeps the task for a later call.
    pub async fn wait(&mut self) -> Result<(), RunError> {
        let Some(task) = self.supervisor.as_mut() else {
            return Ok(());
        };
        let joined = task.await;
        self.supervisor = None;
        settle(joined)
    }

    /// Stop the live generation, wait for its drain, and return.
    pub async fn shutdown(mut self) -> Result<(), RunError> {
        let _ = self.commands.send(Command::Shutdown).await;
        self.wait().await
    }
}

fn settle(joined: Result<Result<(), ServerError>, JoinError>) -> Result<(), RunError> {
    match joined {
        Ok(result) => Ok(result?),
        Err(e) => {
            tracing::error!(error = %e, "Supervisor task failed");
            Err(RunError::Supervisor(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DialerEndpoint, Protocol, ProxyEndpoint};
    use tokio::net::TcpListener;

    fn config(dialer_port: u16) -> Configuration {
        Configuration {
            version: "1".into(),
            dialer: DialerEndpoint {
                host: "127.0.0.1".into(),
                port: dialer_port,
            },
            proxies: vec![ProxyEndpoint {
                protocol: Protocol::Socks5,
                host: "127.0.0.1".into(),
                port: 1080,
                username: None,
                password: None,
                enabled: true,
            }],
        }
    }

    #[tokio::test]
    async fn failed_watch_binds_nothing() {
        let port = {
            let free = TcpListener::bind("127.0.0.1:0").await.unwrap();
            free.local_addr().unwrap().port()
        };
        let unwatchable = PathBuf::from("/nonexistent-proxy-dealer-dir/config.yaml");

        let result = Controller::start(unwatchable, &config(port), LaunchOptions::default()).await;
        assert!(matches!(result, Err(StartupError::Watch(_))));

        // The dialer address is still free: generation 1 never bound it.
        TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    }

    #[tokio::test]
    async fn watch_disabled_starts_without_touching_the_path() {
        let unwatchable = PathBuf::from("/nonexistent-proxy-dealer-dir/config.yaml");
        let options = LaunchOptions {
            watch: false,
            ..LaunchOptions::default()
        };
        let controller = Controller::start(unwatchable, &config(0), options).await.unwrap();
        assert_eq!(controller.generation().borrow().id, 1);
        controller.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn supervisor_panic_is_an_error() {
        let joined = tokio::spawn(async { panic!("supervisor blew up") }).await;
        let outcome = settle(joined.map(|()| Ok(())));
        assert!(matches!(outcome, Err(RunError::Supervisor(_))));
    }

    #[test]
    fn supervisor_exit_passes_through() {
        assert!(settle(Ok(Ok(()))).is_ok());

        let bind = ServerError::Addr(std::io::Error::other("gone"));
        assert!(matches!(settle(Ok(Err(bind))), Err(RunError::Server(_))));
    }
}
