//! CONNECT tunneling.
//!
//! # Data Flow
//! ```text
//! CONNECT host:port
//!     → dial target through SOCKS5 (503 on failure)
//!     → take the upgrade handle (500 if the connection cannot be hijacked)
//!     → "HTTP/1.1 200 Connection established"
//!     → client ⇄ upstream raw byte splice
//! ```
//!
//! # Design Decisions
//! - One task per direction; both share a cancellation token
//! - Whichever direction ends first shuts its destination and cancels the other
//! - No idle timeout: a tunnel lives until a peer closes or errors
//! - Tunnels are detached from the HTTP server and survive a generation's drain

use axum::body::Body;
use axum::http::{Request, Response, StatusCode, Uri};
use hyper::body::Incoming;
use hyper::ext::ReasonPhrase;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::http::response::{error_response, error_text};
use crate::net::dialer::ProxyDialer;

const DEFAULT_CONNECT_PORT: u16 = 443;

/// `host:port` named by a CONNECT request.
pub fn connect_target(uri: &Uri) -> Option<String> {
    let authority = uri.authority()?;
    let port = authority.port_u16().unwrap_or(DEFAULT_CONNECT_PORT);
    Some(format!("{}:{}", authority.host(), port))
}

/// Handle one CONNECT request.
pub async fn handle_connect(dialer: &ProxyDialer, mut req: Request<Incoming>) -> Response<Body> {
    let Some(target) = connect_target(req.uri()) else {
        tracing::warn!(uri = %req.uri(), "CONNECT without host:port");
        return error_response(StatusCode::BAD_REQUEST, "CONNECT target must be host:port");
    };

    let upstream = match dialer.dial("tcp", &target).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(target = %target, error = %e, "Tunnel dial failed");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, &error_text(&e));
        }
    };

    let Some(on_upgrade) = req.extensions_mut().remove::<OnUpgrade>() else {
        drop(upstream);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Hijacking not supported");
    };

    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => splice(TokioIo::new(upgraded), upstream, &target).await,
            // Response write failed: dropping `upstream` closes the other end.
            Err(e) => tracing::warn!(target = %target, error = %e, "Upgrade failed, tunnel aborted"),
        }
    });

    established()
}

fn established() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    response
        .extensions_mut()
        .insert(ReasonPhrase::from_static(b"Connection established"));
    response
}

/// Relay bytes both ways until either side finishes, then close both.
pub async fn splice<C>(client: C, upstream: TcpStream, target: &str)
where
    C: AsyncRead + AsyncWrite + Send + 'static,
{
    let done = CancellationToken::new();
    let (client_read, client_write) = tokio::io::split(client);
    let (upstream_read, upstream_write) = upstream.into_split();

    let outbound = tokio::spawn(pipe(client_read, upstream_write, done.clone()));
    let inbound = tokio::spawn(pipe(upstream_read, client_write, done));

    let (sent, received) = tokio::join!(outbound, inbound);
    tracing::debug!(
        target = %target,
        sent = ?sent.ok().flatten(),
        received = ?received.ok().flatten(),
        "Tunnel closed"
    );
}

/// Copy `src` into `dst`. Returns the byte count when the copy ran to EOF.
async fn pipe<R, W>(mut src: R, mut dst: W, done: CancellationToken) -> Option<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let copied = tokio::select! {
        res = tokio::io::copy(&mut src, &mut dst) => match res {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::debug!(error = %e, "Tunnel leg failed");
                None
            }
        },
        () = done.cancelled() => None,
    };
    let _ = dst.shutdown().await;
    done.cancel();
    copied
}
