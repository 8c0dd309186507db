//! TCP listener binding with retry.
//!
//! # Responsibilities
//! - Bind to the generation's dialer address
//! - Retry `AddrInUse` with backoff while a predecessor releases the port
//! - Fail fast on anything else (bad address, permission denied)

use std::io;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::resilience::backoff::Backoff;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// Retry schedule for binds that race a draining predecessor.
#[derive(Debug, Clone, Copy)]
pub struct BindRetry {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BindRetry {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

/// Bind `address`, retrying while the port is still held.
pub async fn bind(address: &str, retry: BindRetry) -> Result<TcpListener, ListenerError> {
    let mut delays = Backoff::new(retry.base_delay, retry.max_delay);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match TcpListener::bind(address).await {
            Ok(listener) => {
                if let Ok(local) = listener.local_addr() {
                    tracing::info!(address = %local, attempt, "Listener bound");
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse && attempt < retry.max_attempts => {
                let delay = delays.next().unwrap_or(retry.max_delay);
                tracing::warn!(
                    address = %address,
                    attempt,
                    delay = ?delay,
                    "Address in use, retrying bind"
                );
                tokio::time::sleep(delay).await;
            }
            Err(source) => {
                return Err(ListenerError::Bind {
                    address: address.to_string(),
                    source,
                })
            }
        }
    }
}
