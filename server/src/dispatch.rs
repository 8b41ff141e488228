//! Request dispatch: one request payload in, one reply out.
//!
//! Handlers here are pure business logic: they parse, consult the store,
//! and return a [`Reply`]. The connection layer owns framing and the socket.
//! Misses and malformed requests are ordinary replies; only store I/O faults
//! are errors.

use std::io;

use frames::{CHUNK_NOT_FOUND, INVALID_REQUEST, MANIFEST_NOT_FOUND, Request, RequestError};

use crate::store::MediaStore;

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Manifest(Vec<u8>),
    Chunk(Vec<u8>),
    /// No manifest stored for the requested video.
    ManifestMiss,
    /// No chunk stored under the requested identity.
    ChunkMiss,
    /// The payload did not parse as a request.
    Invalid(RequestError),
}

impl Reply {
    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Manifest(_) => "manifest",
            Self::Chunk(_) => "chunk",
            Self::ManifestMiss => "manifest_miss",
            Self::ChunkMiss => "chunk_miss",
            Self::Invalid(_) => "invalid",
        }
    }

    /// Frame body sent back to the client.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        match self {
            Self::Manifest(bytes) | Self::Chunk(bytes) => bytes,
            Self::ManifestMiss => MANIFEST_NOT_FOUND.as_bytes().to_vec(),
            Self::ChunkMiss => CHUNK_NOT_FOUND.as_bytes().to_vec(),
            Self::Invalid(_) => INVALID_REQUEST.as_bytes().to_vec(),
        }
    }
}

/// Handle one request payload against `store`.
///
/// The chunk index is not range-checked: any index the store has data for is
/// served, anything else is a miss.
///
/// # Errors
///
/// Returns the store's I/O error when a lookup fails for reasons other than
/// absence.
pub async fn dispatch(store: &dyn MediaStore, payload: &[u8]) -> io::Result<Reply> {
    let request = match Request::from_payload(payload) {
        Ok(request) => request,
        Err(e) => return Ok(Reply::Invalid(e)),
    };

    match request {
        Request::GetManifest { video_id } => Ok(store
            .read_manifest(&video_id)
            .await?
            .map_or(Reply::ManifestMiss, Reply::Manifest)),
        Request::GetChunk { video_id, bitrate, chunk_index } => {
            if !store.chunk_exists(&video_id, bitrate, chunk_index).await? {
                return Ok(Reply::ChunkMiss);
            }
            // Removed between the existence check and the read: still a miss.
            Ok(store
                .read_chunk(&video_id, bitrate, chunk_index)
                .await?
                .map_or(Reply::ChunkMiss, Reply::Chunk))
        }
    }
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
