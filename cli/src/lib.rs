//! Adaptive-bitrate streaming client.
//!
//! ARCHITECTURE
//! ============
//! - [`abr`]: bitrate ladder, throughput measurement, EWMA estimator.
//! - [`manifest`]: MPD → ladder.
//! - [`sink`]: where chunk payloads and per-chunk records are written.
//! - [`session`]: the request loop tying the above to one connection.

pub mod abr;
pub mod manifest;
pub mod session;
pub mod sink;

pub use frames::ErrorCode;

pub use abr::{Alpha, AlphaError, BandwidthEstimator, BitrateLadder, measure_bandwidth, select_bitrate};
pub use manifest::{ManifestError, ladder_from_payload, parse_ladder};
pub use session::{
    SessionConfig, SessionEnd, SessionError, SessionReport, TimeoutError, parse_request_timeout, run_session,
};
pub use sink::{ArtifactSink, ChunkRecord, DirSink, JsonLinesLog, MemorySink, RecordLog, SinkError, artifact_name};
