//! Relay handler: dispatches each request to tunneling or forwarding.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use hyper::body::Incoming;

use crate::http::forward::{build_client, forward, ForwardClient};
use crate::http::tunnel::handle_connect;
use crate::net::connector::UpstreamConnector;
use crate::net::dialer::ProxyDialer;

/// Request handler of one generation. Cheap to clone.
///
/// Both paths use the same dial capability; nothing here can observe a
/// configuration change made after construction.
#[derive(Clone)]
pub struct RelayHandler {
    dialer: ProxyDialer,
    client: ForwardClient,
}

impl RelayHandler {
    pub fn new(dialer: ProxyDialer) -> Result<Self, rustls::Error> {
        let client = build_client(UpstreamConnector::new(dialer.clone())?);
        Ok(Self { dialer, client })
    }

    pub fn dialer(&self) -> &ProxyDialer {
        &self.dialer
    }

    pub async fn handle(&self, req: Request<Incoming>, remote: SocketAddr) -> Response<Body> {
        tracing::info!(
            remote = %remote,
            method = %req.method(),
            uri = %req.uri(),
            "Request"
        );

        if req.method() == Method::CONNECT {
            handle_connect(&self.dialer, req).await
        } else {
            forward(&self.client, req).await
        }
    }
}
