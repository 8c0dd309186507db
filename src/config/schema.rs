//! Configuration schema definitions.
//!
//! This module defines the configuration document consumed by the relay.
//! All types derive Serde traits for deserialization from the YAML file.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration document.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Configuration {
    /// Free-form document version. Not part of routing.
    pub version: String,

    /// Where the local relay listens.
    pub dialer: DialerEndpoint,

    /// Candidate upstream proxies, in file order.
    pub proxies: Vec<ProxyEndpoint>,
}

/// Local listen endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DialerEndpoint {
    /// Bind host (e.g., "127.0.0.1").
    #[serde(rename = "server")]
    pub host: String,

    /// Bind port.
    pub port: u16,
}

impl Default for DialerEndpoint {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl DialerEndpoint {
    /// `host:port` as used for binding.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream proxy entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub protocol: Protocol,

    #[serde(rename = "server")]
    pub host: String,

    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Marks the entry as a selection candidate.
    #[serde(rename = "use", default)]
    pub enabled: bool,
}

impl ProxyEndpoint {
    /// `host:port` of the proxy server itself.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Credentials, present only when both username and password are non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

/// Upstream proxy protocol.
///
/// Any string deserializes; only SOCKS5 is usable. Rejection happens at
/// selection time so that unused entries never break a reload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Protocol {
    Socks5,
    Unsupported(String),
}

impl Protocol {
    pub fn is_socks5(&self) -> bool {
        matches!(self, Protocol::Socks5)
    }
}

impl From<String> for Protocol {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("socks5") {
            Protocol::Socks5
        } else {
            Protocol::Unsupported(value)
        }
    }
}

impl From<Protocol> for String {
    fn from(value: Protocol) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Socks5 => f.write_str("socks5"),
            Protocol::Unsupported(other) => f.write_str(other),
        }
    }
}
