//! Observability subsystem.
//!
//! Every inbound request, every reload decision and every error is emitted
//! as a `tracing` event; `logging.rs` installs the subscriber.

pub mod logging;
