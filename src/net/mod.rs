//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     listener.rs (bind with retry) → connection.rs (tracking for drain)
//!
//! Outbound:
//!     dialer.rs (SOCKS5 CONNECT, optional user/pass)
//!         ├─▶ CONNECT tunnels (raw TcpStream)
//!         └─▶ connector.rs (hyper client connector, optional TLS)
//! ```
//!
//! # Design Decisions
//! - The dialer is the only way out to the network
//! - Each generation builds its own dialer; nothing is shared across reloads

pub mod connection;
pub mod connector;
pub mod dialer;
pub mod listener;
