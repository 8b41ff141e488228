//! Streaming session: the ABR control loop over one connection.
//!
//! LIFECYCLE
//! =========
//! 1. `GET_MANIFEST` → bitrate ladder. Any failure here is fatal.
//! 2. Estimate starts at [`INITIAL_BANDWIDTH_BPS`](crate::abr::INITIAL_BANDWIDTH_BPS).
//! 3. For each chunk index in order: select bitrate → `GET_CHUNK` → time the
//!    reply → measure → fold into the estimate → store artifact → log record.
//! 4. End-of-stream or timeout on a chunk reply stops the loop with the
//!    estimate unchanged. Nothing is retried and nothing is re-requested.
//!
//! Requests are never pipelined: each waits for its full reply.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{error, info, warn};

use frames::{ErrorCode, FrameError, MANIFEST_NOT_FOUND, Request, is_chunk_miss, read_frame, write_frame};

use crate::abr::{Alpha, BandwidthEstimator, BitrateLadder, DEFAULT_CHUNK_COUNT, measure_bandwidth, select_bitrate};
use crate::manifest::{ManifestError, ladder_from_payload};
use crate::sink::{ArtifactSink, ChunkRecord, RecordLog, SinkError};

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub video_id: String,
    pub alpha: Alpha,
    /// Number of chunks requested, indices `0..chunk_count`.
    pub chunk_count: u64,
    /// Per-reply deadline. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl SessionConfig {
    #[must_use]
    pub fn new(video_id: impl Into<String>, alpha: Alpha) -> Self {
        Self {
            video_id: video_id.into(),
            alpha,
            chunk_count: DEFAULT_CHUNK_COUNT,
            request_timeout: None,
        }
    }

    #[must_use]
    pub fn with_chunk_count(mut self, chunk_count: u64) -> Self {
        self.chunk_count = chunk_count;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeoutError {
    #[error("`{0}` is not a number of seconds")]
    NotANumber(String),
    #[error("timeout must be a positive, finite number of seconds, got {0}")]
    OutOfRange(f64),
}

/// Parse a per-request timeout given in (possibly fractional) seconds.
///
/// # Errors
///
/// Non-numeric input is [`TimeoutError::NotANumber`]. Zero, negative, NaN,
/// infinite, and values too large for a [`Duration`] are
/// [`TimeoutError::OutOfRange`].
pub fn parse_request_timeout(raw: &str) -> Result<Duration, TimeoutError> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| TimeoutError::NotANumber(raw.to_owned()))?;
    if secs <= 0.0 {
        return Err(TimeoutError::OutOfRange(secs));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| TimeoutError::OutOfRange(secs))
}

// =============================================================================
// OUTCOME
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("manifest rejected: {0}")]
    Manifest(#[from] ManifestError),
    #[error("server has no manifest for `{0}`")]
    ManifestNotFound(String),
    #[error("connection closed before the manifest arrived")]
    ClosedBeforeManifest,
    #[error("timed out waiting for the manifest")]
    ManifestTimeout,
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Frame(e) => e.error_code(),
            Self::Manifest(e) => e.error_code(),
            Self::ManifestNotFound(_) => "E_MANIFEST_NOT_FOUND",
            Self::ClosedBeforeManifest => "E_CLOSED",
            Self::ManifestTimeout => "E_TIMEOUT",
            Self::Sink(_) => "E_SINK_IO",
        }
    }
}

/// Why the chunk loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Every configured chunk was requested and answered.
    Completed,
    /// The server closed the connection instead of answering this chunk.
    ConnectionClosed { chunk_index: u64 },
    /// No reply for this chunk within the request timeout.
    TimedOut { chunk_index: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub ladder: BitrateLadder,
    pub records: Vec<ChunkRecord>,
    pub final_bandwidth: f64,
    /// Replies that carried the chunk-miss marker. They are stored and
    /// measured like media.
    pub misses: u64,
    pub end: SessionEnd,
}

// =============================================================================
// LOOP
// =============================================================================

enum Received {
    Frame(Vec<u8>),
    EndOfStream,
    TimedOut,
}

/// Run one session on an already-connected stream.
///
/// # Errors
///
/// Manifest failures, framing errors, and sink failures abort the session.
/// Records appended before the failure stay in `log`.
pub async fn run_session<S, A, L>(
    stream: &mut S,
    config: &SessionConfig,
    artifacts: &A,
    log: &mut L,
) -> Result<SessionReport, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    A: ArtifactSink + ?Sized,
    L: RecordLog + ?Sized,
{
    let video_id = config.video_id.as_str();
    let ladder = fetch_ladder(stream, config).await?;
    info!(%video_id, ladder = ?ladder.rungs(), "session: manifest received");

    let mut estimator = BandwidthEstimator::new(config.alpha);
    let mut records = Vec::new();
    let mut misses = 0;
    let mut end = SessionEnd::Completed;

    for chunk_index in 0..config.chunk_count {
        let bitrate = select_bitrate(&ladder, estimator.bandwidth());
        let request = Request::GetChunk { video_id: video_id.to_owned(), bitrate, chunk_index };
        write_frame(stream, request.to_string().as_bytes()).await?;

        let start_time = unix_secs();
        let started = Instant::now();
        let received = receive(stream, config.request_timeout).await?;
        let elapsed = started.elapsed();

        let data = match received {
            Received::Frame(data) => data,
            Received::EndOfStream => {
                warn!(%video_id, chunk_index, bandwidth = estimator.bandwidth(), "session: server closed connection");
                end = SessionEnd::ConnectionClosed { chunk_index };
                break;
            }
            Received::TimedOut => {
                warn!(%video_id, chunk_index, bandwidth = estimator.bandwidth(), "session: chunk request timed out");
                end = SessionEnd::TimedOut { chunk_index };
                break;
            }
        };

        let measured = measure_bandwidth(data.len(), elapsed);
        let bandwidth = estimator.update(measured);

        if is_chunk_miss(&data) {
            misses += 1;
            warn!(%video_id, bitrate, chunk_index, "session: server has no such chunk; storing reply as-is");
        }

        let artifact = artifacts.store(video_id, bitrate, chunk_index, &data).await?;
        let record = ChunkRecord {
            start_time,
            duration_secs: elapsed.as_secs_f64(),
            measured_bps: measured,
            bandwidth_bps: bandwidth,
            bitrate,
            chunk_index,
            artifact,
        };
        log.append(&record).await?;
        info!(
            chunk_index,
            bitrate,
            bytes = data.len(),
            duration_secs = record.duration_secs,
            measured_bps = measured,
            bandwidth_bps = bandwidth,
            artifact = %record.artifact,
            "session: chunk downloaded"
        );
        records.push(record);
    }

    Ok(SessionReport { ladder, records, final_bandwidth: estimator.bandwidth(), misses, end })
}

async fn fetch_ladder<S>(stream: &mut S, config: &SessionConfig) -> Result<BitrateLadder, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = Request::GetManifest { video_id: config.video_id.clone() };
    write_frame(stream, request.to_string().as_bytes()).await?;

    let payload = match receive(stream, config.request_timeout).await? {
        Received::Frame(payload) => payload,
        Received::EndOfStream => return Err(SessionError::ClosedBeforeManifest),
        Received::TimedOut => return Err(SessionError::ManifestTimeout),
    };

    if payload == MANIFEST_NOT_FOUND.as_bytes() {
        return Err(SessionError::ManifestNotFound(config.video_id.clone()));
    }

    ladder_from_payload(&payload).map_err(|e| {
        error!(video_id = %config.video_id, code = e.error_code(), error = %e, "session: unusable manifest");
        SessionError::Manifest(e)
    })
}

async fn receive<S>(stream: &mut S, deadline: Option<Duration>) -> Result<Received, FrameError>
where
    S: AsyncRead + Unpin,
{
    let frame = match deadline {
        Some(limit) => match tokio::time::timeout(limit, read_frame(stream)).await {
            Ok(frame) => frame?,
            Err(_) => return Ok(Received::TimedOut),
        },
        None => read_frame(stream).await?,
    };
    Ok(frame.map_or(Received::EndOfStream, Received::Frame))
}

/// Seconds since the Unix epoch, 0 if the clock is before it.
fn unix_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
