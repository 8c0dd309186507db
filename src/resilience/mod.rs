//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! New generation binds its listener:
//!     → net::listener::bind (AddrInUse while predecessor drains)
//!     → backoff.rs (exponential delay with jitter between attempts)
//! ```

pub mod backoff;
