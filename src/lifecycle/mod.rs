//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (controller.rs):
//!     Load config → Select proxy → Bind generation 1 → Watch config
//!
//! Reload (supervisor.rs):
//!     Command::Reload → Re-load → Fingerprint → Stop old / Start new
//!
//! Signals (signals.rs):
//!     SIGINT → Graceful teardown (second SIGINT forces exit)
//!     SIGHUP → Config reload
//! ```
//!
//! # Design Decisions
//! - One supervisor task owns the live generation; no shared mutation
//! - A new generation starts while the previous one may still drain
//! - Drain has no deadline; hijacked tunnels are never interrupted

pub mod controller;
pub mod generation;
pub mod signals;
pub mod supervisor;

pub use controller::{Controller, LaunchOptions, RunError, StartupError};
pub use generation::{GenerationInfo, GenerationState};
pub use supervisor::{Command, ReloadOutcome, Supervisor};
