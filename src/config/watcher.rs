//! Configuration file watcher for hot reload.
//!
//! The notify callback only forwards raw "file touched" signals; coalescing
//! bursts into a single reload is done by [`debounce`] on the runtime.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::lifecycle::supervisor::Command;

/// Quiescent window after the last file event before a reload fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    event_tx: mpsc::UnboundedSender<()>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver of raw change notifications.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                event_tx,
            },
            event_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    ///
    /// The parent directory is watched rather than the file itself so that
    /// editors replacing the file by rename are still observed.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.event_tx;
        let file_name: Option<OsString> = self.path.file_name().map(|n| n.to_os_string());
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_config {
                        tracing::debug!(paths = ?event.paths, kind = ?event.kind, "Config file event");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Watch error"),
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Coalesce raw change notifications into reload commands.
///
/// Every event pushes a single pending deadline `window` into the future;
/// when the deadline passes without another event, one `Command::Reload` is
/// sent. Returns when either channel closes.
pub async fn debounce(
    mut events: mpsc::UnboundedReceiver<()>,
    commands: mpsc::Sender<Command>,
    window: Duration,
) {
    let timer = time::sleep(window);
    tokio::pin!(timer);
    let mut pending = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(()) => {
                    pending = true;
                    timer.as_mut().reset(Instant::now() + window);
                }
                None => break,
            },
            () = &mut timer, if pending => {
                pending = false;
                tracing::info!("Configuration modified, reloading");
                if commands.send(Command::Reload).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("Config debouncer stopped");
}
