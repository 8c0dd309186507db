//! Local HTTP proxy relaying through a SOCKS5 upstream, with hot reload.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::{ActiveSelection, Configuration};
pub use http::{RelayHandler, ServerHandle, ServerInstance};
pub use lifecycle::{Controller, LaunchOptions, RunError, StartupError};
