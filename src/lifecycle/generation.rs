//! Generation state machine.
//!
//! ```text
//! Starting ──start()──▶ Running ──stop()──▶ Draining ──idle──▶ Stopped
//! ```
//!
//! A `Draining` generation may coexist with its successor's `Running`
//! state; only hijacked tunnels outlive `Stopped`.

use std::fmt;
use std::net::SocketAddr;

use crate::config::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GenerationState {
    /// Listener bound, accept loop not yet running.
    Starting,
    /// Accepting connections.
    Running,
    /// Listener closed, waiting for in-flight HTTP connections.
    Draining,
    /// No HTTP connection left.
    Stopped,
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationState::Starting => "starting",
            GenerationState::Running => "running",
            GenerationState::Draining => "draining",
            GenerationState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Read-only view of the live generation, published by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationInfo {
    pub id: u64,
    pub listen_addr: SocketAddr,
    pub proxy_addr: String,
    pub fingerprint: Fingerprint,
}
