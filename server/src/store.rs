//! Media storage backing the chunk server.
//!
//! DESIGN
//! ======
//! The server only ever asks three questions of storage: the manifest for a
//! video, whether a chunk exists, and the chunk's bytes. Absence is a normal
//! answer (`Ok(None)` / `Ok(false)`) so the dispatch layer can turn it into a
//! miss reply; only genuine I/O faults surface as errors.
//!
//! On-disk layout used by [`FsStore`]:
//!
//! ```text
//! <root>/<video>/manifest.mpd
//! <root>/<video>/chunks/<video>_<bitrate>_<index:05>.m4s
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use frames::padded_index;

/// Read-only view of manifests and pre-segmented chunks.
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    /// Raw manifest bytes for `video_id`, or `None` when the video is unknown.
    async fn read_manifest(&self, video_id: &str) -> io::Result<Option<Vec<u8>>>;

    async fn chunk_exists(&self, video_id: &str, bitrate: u64, chunk_index: u64) -> io::Result<bool>;

    /// Raw chunk bytes, or `None` when no chunk is stored under that identity.
    async fn read_chunk(&self, video_id: &str, bitrate: u64, chunk_index: u64) -> io::Result<Option<Vec<u8>>>;
}

// =============================================================================
// FILESYSTEM STORE
// =============================================================================

/// Store rooted at a data directory on disk.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn manifest_path(&self, video_id: &str) -> PathBuf {
        self.root.join(video_id).join("manifest.mpd")
    }

    #[must_use]
    pub fn chunk_path(&self, video_id: &str, bitrate: u64, chunk_index: u64) -> PathBuf {
        let file = format!("{video_id}_{bitrate}_{}.m4s", padded_index(chunk_index));
        self.root.join(video_id).join("chunks").join(file)
    }
}

#[async_trait::async_trait]
impl MediaStore for FsStore {
    async fn read_manifest(&self, video_id: &str) -> io::Result<Option<Vec<u8>>> {
        read_optional(&self.manifest_path(video_id)).await
    }

    async fn chunk_exists(&self, video_id: &str, bitrate: u64, chunk_index: u64) -> io::Result<bool> {
        tokio::fs::try_exists(self.chunk_path(video_id, bitrate, chunk_index)).await
    }

    async fn read_chunk(&self, video_id: &str, bitrate: u64, chunk_index: u64) -> io::Result<Option<Vec<u8>>> {
        read_optional(&self.chunk_path(video_id, bitrate, chunk_index)).await
    }
}

async fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

type ChunkKey = (String, u64, u64);

/// In-memory store for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    manifests: HashMap<String, Vec<u8>>,
    chunks: HashMap<ChunkKey, Vec<u8>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_manifest(mut self, video_id: impl Into<String>, manifest: impl Into<Vec<u8>>) -> Self {
        self.manifests.insert(video_id.into(), manifest.into());
        self
    }

    #[must_use]
    pub fn with_chunk(
        mut self,
        video_id: impl Into<String>,
        bitrate: u64,
        chunk_index: u64,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        self.chunks
            .insert((video_id.into(), bitrate, chunk_index), data.into());
        self
    }

    fn chunk(&self, video_id: &str, bitrate: u64, chunk_index: u64) -> Option<&Vec<u8>> {
        self.chunks.get(&(video_id.to_owned(), bitrate, chunk_index))
    }
}

#[async_trait::async_trait]
impl MediaStore for MemoryStore {
    async fn read_manifest(&self, video_id: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.manifests.get(video_id).cloned())
    }

    async fn chunk_exists(&self, video_id: &str, bitrate: u64, chunk_index: u64) -> io::Result<bool> {
        Ok(self.chunk(video_id, bitrate, chunk_index).is_some())
    }

    async fn read_chunk(&self, video_id: &str, bitrate: u64, chunk_index: u64) -> io::Result<Option<Vec<u8>>> {
        Ok(self.chunk(video_id, bitrate, chunk_index).cloned())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
