//! SOCKS5 dial capability.
//!
//! # Responsibilities
//! - Bind one upstream SOCKS5 endpoint (optionally authenticated)
//! - Open TCP connections to arbitrary targets through it
//! - Classify failures (proxy unreachable, auth rejected, SOCKS reply)
//!
//! Every outbound connection of a generation, tunneled or forwarded,
//! goes through a `ProxyDialer`; nothing dials targets directly.

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;

use crate::config::ProxyEndpoint;

/// Errors produced while building or using the dial capability.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("unsupported proxy protocol {0:?}")]
    UnsupportedProtocol(String),
    #[error("unsupported network {0:?}")]
    UnsupportedNetwork(String),
    #[error("socks5 proxy {proxy} unreachable")]
    ProxyUnreachable { proxy: String },
    #[error("socks5 proxy {proxy} rejected authentication")]
    ProxyAuthRejected { proxy: String },
    #[error("socks5 connect to {target} failed: {source}")]
    Socks {
        target: String,
        #[source]
        source: tokio_socks::Error,
    },
    #[error("tls handshake with {host} failed: {reason}")]
    Tls { host: String, reason: String },
    #[error("invalid upstream uri: {0}")]
    InvalidUri(String),
}

#[derive(Debug)]
struct Credentials {
    username: String,
    password: String,
}

/// Dial capability bound to one SOCKS5 endpoint. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ProxyDialer {
    proxy_addr: Arc<str>,
    auth: Option<Arc<Credentials>>,
}

impl ProxyDialer {
    /// Build a dialer for the given endpoint. No I/O happens here.
    pub fn build(endpoint: &ProxyEndpoint) -> Result<Self, DialError> {
        if !endpoint.protocol.is_socks5() {
            return Err(DialError::UnsupportedProtocol(endpoint.protocol.to_string()));
        }

        let auth = endpoint.credentials().map(|(username, password)| {
            Arc::new(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            })
        });

        Ok(Self {
            proxy_addr: endpoint.address().into(),
            auth,
        })
    }

    /// `host:port` of the upstream SOCKS5 server.
    pub fn proxy_addr(&self) -> &str {
        &self.proxy_addr
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Open a connection to `address` (`host:port`) through the proxy.
    ///
    /// Only stream networks are supported by SOCKS5 CONNECT.
    pub async fn dial(&self, network: &str, address: &str) -> Result<TcpStream, DialError> {
        if !matches!(network, "tcp" | "tcp4" | "tcp6") {
            return Err(DialError::UnsupportedNetwork(network.to_string()));
        }

        let proxy = &*self.proxy_addr;
        let result = match &self.auth {
            Some(auth) => {
                Socks5Stream::connect_with_password(proxy, address, &auth.username, &auth.password)
                    .await
            }
            None => Socks5Stream::connect(proxy, address).await,
        };

        match result {
            Ok(stream) => {
                tracing::trace!(proxy = %proxy, target = %address, "Upstream connection established");
                Ok(stream.into_inner())
            }
            Err(e) => Err(self.classify(address, e)),
        }
    }

    fn classify(&self, target: &str, err: tokio_socks::Error) -> DialError {
        let proxy = self.proxy_addr.to_string();
        match err {
            tokio_socks::Error::ProxyServerUnreachable => DialError::ProxyUnreachable { proxy },
            tokio_socks::Error::PasswordAuthFailure(_)
            | tokio_socks::Error::NoAcceptableAuthMethods => DialError::ProxyAuthRejected { proxy },
            source => DialError::Socks {
                target: target.to_string(),
                source,
            },
        }
    }
}
