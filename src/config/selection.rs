//! Active selection: which dialer and which upstream proxy a generation uses.
//!
//! # Design Decisions
//! - The last enabled proxy wins; later entries override earlier ones
//! - Only the selected entry is checked for protocol support
//! - Pure function: Configuration → Result<ActiveSelection, SelectionError>

use crate::config::schema::{Configuration, DialerEndpoint, ProxyEndpoint};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("no proxy is enabled")]
    NoEnabledProxy,
    #[error("unsupported proxy protocol {0:?}, only socks5 is supported")]
    UnsupportedProtocol(String),
}

/// The endpoints one generation is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSelection {
    pub dialer: DialerEndpoint,
    pub proxy: ProxyEndpoint,
}

impl ActiveSelection {
    /// Derive the selection from a parsed configuration.
    pub fn from_config(config: &Configuration) -> Result<Self, SelectionError> {
        let proxy = config
            .proxies
            .iter()
            .rev()
            .find(|p| p.enabled)
            .ok_or(SelectionError::NoEnabledProxy)?;

        if !proxy.protocol.is_socks5() {
            return Err(SelectionError::UnsupportedProtocol(proxy.protocol.to_string()));
        }

        Ok(Self {
            dialer: config.dialer.clone(),
            proxy: proxy.clone(),
        })
    }
}
