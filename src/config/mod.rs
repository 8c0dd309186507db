//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML)
//!     → loader.rs (read & deserialize)
//!     → selection.rs (last enabled socks5 proxy + dialer)
//!     → fingerprint.rs (digests for change detection)
//!     → ActiveSelection (immutable, owned by one generation)
//!
//! On file change:
//!     watcher.rs detects change
//!     → debounce (100ms quiescence)
//!     → supervisor reloads, compares fingerprints, maybe restarts
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a new generation
//! - Fields unrelated to routing (e.g. `version`) never trigger a restart
//! - Parsing separates syntactic (serde) from semantic checks (selection)

pub mod fingerprint;
pub mod loader;
pub mod schema;
pub mod selection;
pub mod watcher;

pub use fingerprint::Fingerprint;
pub use loader::{load_config, resolve_config_path, ConfigError, CONFIG_FILE_ENV};
pub use schema::{Configuration, DialerEndpoint, Protocol, ProxyEndpoint};
pub use selection::{ActiveSelection, SelectionError};
