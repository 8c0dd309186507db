//! Server instance: one listener plus one relay handler.
//!
//! # Responsibilities
//! - Build the dial capability and handler for one selection
//! - Bind the dialer address (with retry while a predecessor releases it)
//! - Serve HTTP/1.1 with upgrades until stopped
//! - Drain in-flight HTTP connections on stop; leave tunnels alone
//!
//! # Design Decisions
//! - HTTP/2 is never negotiated; the CONNECT hijack needs HTTP/1.1
//! - Stop closes the listener immediately so a successor can bind
//! - Drain has no deadline

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::ActiveSelection;
use crate::http::handler::RelayHandler;
use crate::lifecycle::generation::GenerationState;
use crate::net::connection::ConnectionTracker;
use crate::net::dialer::{DialError, ProxyDialer};
use crate::net::listener::{self, BindRetry, ListenerError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Dial(#[from] DialError),
    #[error("failed to build tls client: {0}")]
    Tls(#[from] rustls::Error),
    #[error(transparent)]
    Bind(#[from] ListenerError),
    #[error("failed to read local address: {0}")]
    Addr(#[source] std::io::Error),
}

/// A bound, not yet serving, generation.
pub struct ServerInstance {
    listener: TcpListener,
    handler: RelayHandler,
    tracker: ConnectionTracker,
    state: watch::Sender<GenerationState>,
    handle: ServerHandle,
}

/// Control and observation handle for a server instance.
#[derive(Clone)]
pub struct ServerHandle {
    id: u64,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    state: watch::Receiver<GenerationState>,
}

impl ServerInstance {
    /// Build the handler for `selection` and bind its dialer address.
    pub async fn bind(
        id: u64,
        selection: &ActiveSelection,
        retry: BindRetry,
    ) -> Result<Self, ServerError> {
        let dialer = ProxyDialer::build(&selection.proxy)?;
        let handler = RelayHandler::new(dialer)?;
        let listener = listener::bind(&selection.dialer.address(), retry).await?;
        let local_addr = listener.local_addr().map_err(ServerError::Addr)?;

        let (state, state_rx) = watch::channel(GenerationState::Starting);
        Ok(Self {
            listener,
            handler,
            tracker: ConnectionTracker::new(),
            state,
            handle: ServerHandle {
                id,
                local_addr,
                shutdown: CancellationToken::new(),
                state: state_rx,
            },
        })
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Serve until [`ServerHandle::stop`], then drain.
    pub async fn start(self) {
        let Self {
            listener,
            handler,
            tracker,
            state,
            handle,
        } = self;
        let id = handle.id;

        state.send_replace(GenerationState::Running);
        tracing::info!(
            generation = id,
            address = %handle.local_addr,
            proxy = %format!("socks5://{}", handler.dialer().proxy_addr()),
            "Server is running"
        );

        loop {
            tokio::select! {
                () = handle.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        serve_connection(stream, peer, handler.clone(), &tracker, handle.shutdown.clone());
                    }
                    Err(e) => {
                        tracing::warn!(generation = id, error = %e, "Accept failed");
                        // Back off on fd exhaustion instead of spinning.
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
            }
        }

        drop(listener);
        state.send_replace(GenerationState::Draining);
        tracing::info!(
            generation = id,
            in_flight = tracker.active_count(),
            "Listener closed, draining"
        );

        tracker.wait_idle().await;
        state.send_replace(GenerationState::Stopped);
        tracing::info!(generation = id, "Server stopped");
    }
}

fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handler: RelayHandler,
    tracker: &ConnectionTracker,
    shutdown: CancellationToken,
) {
    let guard = tracker.track();
    tokio::spawn(async move {
        let service = service_fn(move |req: Request<Incoming>| {
            let handler = handler.clone();
            async move { Ok::<_, Infallible>(handler.handle(req, peer).await) }
        });

        // CONNECT replies must be exactly the status line and a blank line.
        let conn = http1::Builder::new()
            .timer(TokioTimer::new())
            .auto_date_header(false)
            .serve_connection(TokioIo::new(stream), service)
            .with_upgrades();
        tokio::pin!(conn);

        let mut draining = false;
        loop {
            tokio::select! {
                res = conn.as_mut() => {
                    if let Err(e) = res {
                        tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection ended with error");
                    }
                    break;
                }
                () = shutdown.cancelled(), if !draining => {
                    draining = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        }
        drop(guard);
    });
}

impl ServerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and begin draining. Idempotent.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn state(&self) -> GenerationState {
        *self.state.borrow()
    }

    /// Wait until the instance has reached `target` (or a later state).
    ///
    /// Returns `false` if the instance was dropped without getting there.
    pub async fn wait_for(&self, target: GenerationState) -> bool {
        let mut state = self.state.clone();
        // Bound first: the `Ref` borrows `state` and must drop before it.
        let reached = state.wait_for(|s| *s >= target).await.is_ok();
        reached
    }
}
