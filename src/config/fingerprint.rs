//! Cheap equality digests for reload detection.
//!
//! A fingerprint is a CRC-32 over a canonical rendering of each endpoint.
//! Collisions read as "no change"; nothing relies on it for security.

use crate::config::schema::{DialerEndpoint, ProxyEndpoint};
use crate::config::selection::ActiveSelection;

impl DialerEndpoint {
    /// Digest over `"{host}:{port}"`.
    pub fn fingerprint(&self) -> u32 {
        crc32fast::hash(format!("{}:{}", self.host, self.port).as_bytes())
    }
}

impl ProxyEndpoint {
    /// Digest over `"{protocol}//:{username}:{password}@{host}:{port}"`.
    pub fn fingerprint(&self) -> u32 {
        let canonical = format!(
            "{}//:{}:{}@{}:{}",
            self.protocol,
            self.username.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default(),
            self.host,
            self.port
        );
        crc32fast::hash(canonical.as_bytes())
    }
}

/// Digest pair for one selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub dialer: u32,
    pub proxy: u32,
}

impl Fingerprint {
    pub fn of(selection: &ActiveSelection) -> Self {
        Self {
            dialer: selection.dialer.fingerprint(),
            proxy: selection.proxy.fingerprint(),
        }
    }
}
