//! Per-connection request loop.
//!
//! LIFECYCLE
//! =========
//! Two states: `AwaitingRequest` and `Closed`.
//! 1. Read one frame. End-of-stream → `Closed` (clean, no reply).
//! 2. Dispatch the payload, write exactly one reply frame.
//! 3. Back to `AwaitingRequest`.
//!
//! Requests on one connection are strictly sequential: the next frame is not
//! read until the previous reply has been written. Framing and I/O errors end
//! this connection only; the listener keeps accepting.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};
use uuid::Uuid;

use frames::{ErrorCode, FrameError, read_frame_with_limit, write_frame};

use crate::dispatch::{Reply, dispatch};
use crate::store::MediaStore;

/// Default cap on a single request frame. Requests are one short text line.
pub const DEFAULT_MAX_REQUEST_BYTES: u32 = 64 * 1024;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("store lookup failed: {0}")]
    Store(#[source] std::io::Error),
}

impl ErrorCode for ServerError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Frame(e) => e.error_code(),
            Self::Store(_) => "E_STORE_IO",
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingRequest,
    Closed,
}

/// Totals for one finished connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub requests: u64,
    pub bytes_sent: u64,
}

// =============================================================================
// LOOP
// =============================================================================

/// Serve requests on `stream` until the peer closes it.
///
/// # Errors
///
/// Returns [`ServerError::Frame`] for framing or socket failures and
/// [`ServerError::Store`] when the store cannot be read. Either way the
/// connection is finished.
pub async fn serve_connection<S>(
    stream: &mut S,
    store: &dyn MediaStore,
    max_request_bytes: u32,
    conn_id: Uuid,
) -> Result<ConnectionSummary, ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut summary = ConnectionSummary::default();
    let mut state = ConnectionState::AwaitingRequest;

    while state == ConnectionState::AwaitingRequest {
        let Some(payload) = read_frame_with_limit(stream, max_request_bytes).await? else {
            debug!(%conn_id, "conn: end of stream");
            state = ConnectionState::Closed;
            continue;
        };

        let reply = dispatch(store, &payload).await.map_err(ServerError::Store)?;
        log_reply(conn_id, &payload, &reply);

        let body = reply.into_payload();
        write_frame(stream, &body).await?;

        summary.requests += 1;
        summary.bytes_sent += body.len() as u64 + frames::HEADER_LEN as u64;
    }

    Ok(summary)
}

fn log_reply(conn_id: Uuid, payload: &[u8], reply: &Reply) {
    let request = String::from_utf8_lossy(payload);
    match reply {
        Reply::Invalid(e) => {
            warn!(%conn_id, %request, code = e.error_code(), error = %e, "conn: invalid request");
        }
        Reply::ManifestMiss | Reply::ChunkMiss => {
            info!(%conn_id, %request, reply = reply.kind(), "conn: miss");
        }
        Reply::Manifest(bytes) | Reply::Chunk(bytes) => {
            info!(%conn_id, %request, reply = reply.kind(), bytes = bytes.len(), "conn: served");
        }
    }
}

#[cfg(test)]
#[path = "conn_test.rs"]
mod tests;
