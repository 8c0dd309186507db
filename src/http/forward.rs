//! Plain HTTP forwarding through the generation's SOCKS5 transport.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};

use crate::http::response::{error_response, error_text};
use crate::net::connector::UpstreamConnector;

/// Idle pooled connections are closed after this long.
pub const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Outbound HTTP/1.1 client bound to one dial capability.
pub type ForwardClient = Client<UpstreamConnector, Body>;

/// Per-host idle cap: available parallelism plus one.
pub fn max_idle_per_host() -> usize {
    num_cpus::get() + 1
}

pub fn build_client(connector: UpstreamConnector) -> ForwardClient {
    Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_idle_timeout(IDLE_CONNECTION_TIMEOUT)
        .pool_max_idle_per_host(max_idle_per_host())
        .build(connector)
}

/// Round-trip `req` upstream and relay the response.
///
/// Headers are copied with `append`, so repeated keys keep their order.
pub async fn forward(client: &ForwardClient, req: Request<Incoming>) -> Response<Body> {
    let uri = req.uri().clone();
    let upstream = match client.request(req.map(Body::new)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(uri = %uri, error = %e, "Upstream request failed");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, &error_text(&e));
        }
    };

    let (parts, body) = upstream.into_parts();
    let mut response = Response::new(Body::new(body));
    *response.status_mut() = parts.status;
    let headers = response.headers_mut();
    for (name, value) in parts.headers.iter() {
        headers.append(name.clone(), value.clone());
    }
    response
}
