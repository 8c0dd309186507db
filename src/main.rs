//! proxy-dealer
//!
//! A local HTTP proxy that relays every request through a SOCKS5 upstream.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                 PROXY DEALER                 │
//!   HTTP client           │  ┌──────────┐   ┌─────────┐   ┌───────────┐  │
//!   ──────────────────────┼─▶│ listener │──▶│ handler │──▶│  dialer   │──┼──▶ SOCKS5 ──▶ Target
//!                         │  │ (dialer) │   │ CONNECT │   │ (socks5)  │  │
//!                         │  └──────────┘   │ forward │   └───────────┘  │
//!                         │                 └─────────┘                  │
//!                         │  ┌────────────────────────────────────────┐  │
//!                         │  │ config.yaml ─▶ watcher ─▶ supervisor   │  │
//!                         │  │       (debounce, fingerprint, restart) │  │
//!                         │  └────────────────────────────────────────┘  │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use proxy_dealer::config::{resolve_config_path, CONFIG_FILE_ENV};
use proxy_dealer::lifecycle::signals;
use proxy_dealer::observability::logging;
use proxy_dealer::Controller;

#[derive(Parser, Debug)]
#[command(name = "proxy-dealer", version, about = "HTTP proxy relaying through SOCKS5")]
struct Args {
    /// Path to the YAML configuration file [default: config.yaml next to the executable]
    #[arg(short, long, env = CONFIG_FILE_ENV)]
    config: Option<PathBuf>,

    /// Log level for this crate (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(args.log_level.as_deref());

    tracing::info!("proxy-dealer v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = resolve_config_path(args.config);
    let mut controller = Controller::launch(config_path).await?;

    tokio::spawn(signals::forward_hangups(controller.commands()));

    tokio::select! {
        result = controller.wait() => {
            result?;
            return Ok(());
        }
        () = signals::interrupt() => {}
    }

    tracing::warn!("For exit press ctrl + C again.");

    tokio::select! {
        result = controller.shutdown() => {
            result?;
            tracing::info!("Shutdown complete");
        }
        () = signals::interrupt() => {
            tracing::warn!("Forced exit");
            std::process::exit(130);
        }
    }

    Ok(())
}
