//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper http1 with upgrades, per-connection task)
//!     → handler.rs (log, dispatch on method)
//!         ├─ CONNECT → tunnel.rs (dial, hijack, splice)
//!         └─ other   → forward.rs (round-trip via SOCKS5-backed client)
//!     → response.rs (error responses)
//! ```

pub mod forward;
pub mod handler;
pub mod response;
pub mod server;
pub mod tunnel;

pub use handler::RelayHandler;
pub use server::{ServerError, ServerHandle, ServerInstance};
