//! Chunk server: serves per-video manifests and pre-segmented chunks.
//!
//! ARCHITECTURE
//! ============
//! The accept loop hands each connection to its own tokio task. A task owns
//! its socket exclusively and shares only the read-only [`MediaStore`], so
//! connections need no synchronization with each other. Within a connection
//! requests are answered strictly in order (see [`conn`]).

pub mod config;
pub mod conn;
pub mod dispatch;
pub mod store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use frames::ErrorCode;
use tokio::net::TcpListener;
use tracing::{info, warn};
use uuid::Uuid;

pub use config::{ConfigError, ServerArgs, ServerConfig};
pub use conn::{ConnectionState, ConnectionSummary, ServerError, serve_connection};
pub use dispatch::{Reply, dispatch};
pub use store::{FsStore, MediaStore, MemoryStore};

/// Pause after a failed `accept` so a persistent fault (e.g. fd exhaustion)
/// does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept connections until `shutdown` resolves.
///
/// Errors on individual connections are logged and never stop the loop.
///
/// # Errors
///
/// Currently infallible once the listener is bound; the `Result` leaves room
/// for listener-level failures.
pub async fn serve<F>(
    listener: TcpListener,
    store: Arc<dyn MediaStore>,
    max_request_bytes: u32,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("server: shutdown requested");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (mut stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "server: accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };

                let conn_id = Uuid::new_v4();
                let store = Arc::clone(&store);
                info!(%conn_id, %peer, "server: accepted connection");

                tokio::spawn(async move {
                    match serve_connection(&mut stream, store.as_ref(), max_request_bytes, conn_id).await {
                        Ok(summary) => {
                            info!(%conn_id, requests = summary.requests, bytes_sent = summary.bytes_sent, "server: connection closed");
                        }
                        Err(e) => {
                            warn!(%conn_id, code = e.error_code(), error = %e, "server: connection aborted");
                        }
                    }
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
