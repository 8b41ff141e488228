//! Where downloaded chunks and per-chunk records go.
//!
//! The session writes through two seams: an [`ArtifactSink`] that persists
//! each payload under its (video, bitrate, index) key, and a [`RecordLog`]
//! that receives one [`ChunkRecord`] per download. Records are appended and
//! flushed one at a time so an aborted session leaves everything written so
//! far on disk.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use frames::padded_index;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("record encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One completed chunk download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Wall-clock request start, seconds since the Unix epoch.
    pub start_time: f64,
    pub duration_secs: f64,
    /// Throughput of this download, bits/second.
    pub measured_bps: f64,
    /// Estimate after folding in this download, bits/second.
    pub bandwidth_bps: f64,
    pub bitrate: u64,
    pub chunk_index: u64,
    /// Key the payload was stored under.
    pub artifact: String,
}

/// Storage name for a downloaded chunk, e.g. `bbb-300000-00007.m4s`.
#[must_use]
pub fn artifact_name(video_id: &str, bitrate: u64, chunk_index: u64) -> String {
    format!("{video_id}-{bitrate}-{}.m4s", padded_index(chunk_index))
}

#[async_trait::async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist one payload and return the key it was stored under.
    async fn store(&self, video_id: &str, bitrate: u64, chunk_index: u64, data: &[u8]) -> Result<String, SinkError>;
}

#[async_trait::async_trait]
pub trait RecordLog: Send {
    async fn append(&mut self, record: &ChunkRecord) -> Result<(), SinkError>;
}

// =============================================================================
// DIRECTORY SINK
// =============================================================================

/// Writes each chunk to `<dir>/<artifact_name>`, creating `dir` on demand.
#[derive(Debug, Clone)]
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait::async_trait]
impl ArtifactSink for DirSink {
    async fn store(&self, video_id: &str, bitrate: u64, chunk_index: u64, data: &[u8]) -> Result<String, SinkError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = artifact_name(video_id, bitrate, chunk_index);
        tokio::fs::write(self.dir.join(&name), data).await?;
        Ok(name)
    }
}

// =============================================================================
// JSON LINES LOG
// =============================================================================

/// Appends one JSON object per line to a file truncated at creation.
#[derive(Debug)]
pub struct JsonLinesLog {
    file: tokio::fs::File,
}

impl JsonLinesLog {
    /// # Errors
    ///
    /// Returns [`SinkError::Io`] when the file cannot be created.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = tokio::fs::File::create(path).await?;
        Ok(Self { file })
    }
}

#[async_trait::async_trait]
impl RecordLog for JsonLinesLog {
    async fn append(&mut self, record: &ChunkRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file.write_all(&line).await?;
        self.file.flush().await?;
        Ok(())
    }
}

// =============================================================================
// MEMORY SINK
// =============================================================================

/// Keeps artifacts and records in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    artifacts: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    records: Arc<Mutex<Vec<ChunkRecord>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn artifacts(&self) -> Vec<(String, Vec<u8>)> {
        self.artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn records(&self) -> Vec<ChunkRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl ArtifactSink for MemorySink {
    async fn store(&self, video_id: &str, bitrate: u64, chunk_index: u64, data: &[u8]) -> Result<String, SinkError> {
        let name = artifact_name(video_id, bitrate, chunk_index);
        self.artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.clone(), data.to_vec()));
        Ok(name)
    }
}

#[async_trait::async_trait]
impl RecordLog for MemorySink {
    async fn append(&mut self, record: &ChunkRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod tests;
