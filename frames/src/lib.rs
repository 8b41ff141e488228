//! Shared wire protocol for the chunk server and the streaming client.
//!
//! This crate owns the representation used by both `server` and `cli`:
//! length-prefixed frames over a byte stream, the textual request grammar
//! carried inside request frames, and the fixed reply strings the server
//! uses for misses and malformed requests.
//!
//! ```text
//! +----------------------+------------------------------+
//! | payload_len (u32 BE) | payload (payload_len bytes)  |
//! +----------------------+------------------------------+
//!        4 bytes                   variable
//! ```

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Size of the big-endian length prefix.
pub const HEADER_LEN: usize = 4;

/// Reply body for a chunk the server has no data for.
pub const CHUNK_NOT_FOUND: &str = "Chunk not found";

/// Reply body for a manifest the server has no data for.
pub const MANIFEST_NOT_FOUND: &str = "Manifest not found";

/// Reply body for anything that does not parse as a [`Request`].
pub const INVALID_REQUEST: &str = "Invalid request";

/// Command token for manifest requests.
pub const GET_MANIFEST: &str = "GET_MANIFEST";

/// Command token for chunk requests.
pub const GET_CHUNK: &str = "GET_CHUNK";

/// Upper bound on the initial payload buffer. Larger frames grow as bytes arrive.
const READ_CHUNK_CAPACITY: usize = 64 * 1024;

// =============================================================================
// ERRORS
// =============================================================================

/// Errors that carry a stable, grepable code for logs.
pub trait ErrorCode: fmt::Display {
    fn error_code(&self) -> &'static str;
}

/// Error returned by the frame reader and writer.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The underlying stream failed.
    #[error("frame i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The stream closed partway through the length prefix.
    #[error("stream closed after {received} of 4 length-prefix bytes")]
    TruncatedHeader { received: usize },
    /// The stream closed before the declared payload length arrived.
    #[error("stream closed after {received} of {expected} payload bytes")]
    TruncatedPayload { expected: u32, received: usize },
    /// The payload does not fit in a 32-bit length prefix.
    #[error("payload of {len} bytes exceeds the 32-bit length prefix")]
    TooLarge { len: usize },
    /// The peer declared a frame larger than the reader accepts.
    #[error("declared frame length {len} exceeds limit {limit}")]
    ExceedsLimit { len: u32, limit: u32 },
}

impl ErrorCode for FrameError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "E_FRAME_IO",
            Self::TruncatedHeader { .. } | Self::TruncatedPayload { .. } => "E_FRAME_TRUNCATED",
            Self::TooLarge { .. } => "E_FRAME_TOO_LARGE",
            Self::ExceedsLimit { .. } => "E_FRAME_LIMIT",
        }
    }
}

/// Why a request payload was rejected. Every variant is answered with
/// [`INVALID_REQUEST`]; the connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("request is not UTF-8 text")]
    NotUtf8,
    #[error("empty request")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("{command} expects {expected} arguments, got {got}")]
    WrongArity { command: &'static str, expected: usize, got: usize },
    #[error("`{0}` is not a decimal number")]
    InvalidNumber(String),
    #[error("video id `{0}` is not a plain name")]
    InvalidVideoId(String),
}

impl ErrorCode for RequestError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotUtf8 => "E_REQ_UTF8",
            Self::Empty => "E_REQ_EMPTY",
            Self::UnknownCommand(_) => "E_REQ_UNKNOWN",
            Self::WrongArity { .. } => "E_REQ_ARITY",
            Self::InvalidNumber(_) => "E_REQ_NUMBER",
            Self::InvalidVideoId(_) => "E_REQ_VIDEO_ID",
        }
    }
}

// =============================================================================
// FRAMING
// =============================================================================

/// Write one frame: the 4-byte big-endian length followed by `payload`.
///
/// Prefix and payload go out as a single buffer, then the writer is flushed.
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] when `payload` exceeds `u32::MAX` bytes
/// and [`FrameError::Io`] when the stream is closed or fails.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge { len: payload.len() })?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);

    writer.write_all(&out).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame with no limit beyond the 32-bit prefix.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly at a frame
/// boundary. That is the end-of-stream marker, not an error.
///
/// # Errors
///
/// See [`read_frame_with_limit`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    read_frame_with_limit(reader, u32::MAX).await
}

/// Read one frame, rejecting declared lengths above `limit`.
///
/// Short reads are accumulated until exactly the declared number of bytes
/// has arrived; callers never see a partial payload.
///
/// # Errors
///
/// - [`FrameError::TruncatedHeader`] if the stream closes inside the prefix.
/// - [`FrameError::ExceedsLimit`] if the prefix declares more than `limit`.
/// - [`FrameError::TruncatedPayload`] if the stream closes inside the payload.
/// - [`FrameError::Io`] for any underlying read failure.
pub async fn read_frame_with_limit<R>(reader: &mut R, limit: u32) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FrameError::TruncatedHeader { received: filled });
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header);
    if len > limit {
        return Err(FrameError::ExceedsLimit { len, limit });
    }

    let expected = len as usize;
    let mut payload = Vec::with_capacity(expected.min(READ_CHUNK_CAPACITY));
    let received = reader.take(u64::from(len)).read_to_end(&mut payload).await?;
    if received < expected {
        return Err(FrameError::TruncatedPayload { expected: len, received });
    }

    Ok(Some(payload))
}

// =============================================================================
// REQUESTS
// =============================================================================

/// One client request. Rendered to and parsed from the space-separated
/// command line carried in a request frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// `GET_MANIFEST <video_id>`
    GetManifest { video_id: String },
    /// `GET_CHUNK <video_id> <bitrate> <chunk_index>`
    GetChunk { video_id: String, bitrate: u64, chunk_index: u64 },
}

impl Request {
    /// Parse a request frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::NotUtf8`] for non-text payloads, otherwise as
    /// [`Request::parse`].
    pub fn from_payload(payload: &[u8]) -> Result<Self, RequestError> {
        let line = std::str::from_utf8(payload).map_err(|_| RequestError::NotUtf8)?;
        Self::parse(line)
    }

    /// Parse a request line. Command tokens are case-sensitive.
    ///
    /// Numbers are plain decimal, so the zero-padded index `00007` parses
    /// to 7 and re-pads to the same storage name.
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] describing why the line is not a request.
    pub fn parse(line: &str) -> Result<Self, RequestError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = tokens.split_first() else {
            return Err(RequestError::Empty);
        };

        match command {
            GET_MANIFEST => {
                let [video_id] = args else {
                    return Err(RequestError::WrongArity { command: GET_MANIFEST, expected: 1, got: args.len() });
                };
                Ok(Self::GetManifest { video_id: parse_video_id(video_id)? })
            }
            GET_CHUNK => {
                let [video_id, bitrate, chunk_index] = args else {
                    return Err(RequestError::WrongArity { command: GET_CHUNK, expected: 3, got: args.len() });
                };
                Ok(Self::GetChunk {
                    video_id: parse_video_id(video_id)?,
                    bitrate: parse_decimal(bitrate)?,
                    chunk_index: parse_decimal(chunk_index)?,
                })
            }
            other => Err(RequestError::UnknownCommand(other.to_owned())),
        }
    }

    /// Video this request refers to.
    #[must_use]
    pub fn video_id(&self) -> &str {
        match self {
            Self::GetManifest { video_id } | Self::GetChunk { video_id, .. } => video_id,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetManifest { video_id } => write!(f, "{GET_MANIFEST} {video_id}"),
            Self::GetChunk { video_id, bitrate, chunk_index } => {
                write!(f, "{GET_CHUNK} {video_id} {bitrate} {chunk_index}")
            }
        }
    }
}

fn parse_decimal(token: &str) -> Result<u64, RequestError> {
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RequestError::InvalidNumber(token.to_owned()));
    }
    token
        .parse()
        .map_err(|_| RequestError::InvalidNumber(token.to_owned()))
}

/// Video ids become path components on the server, so separators and
/// parent references are refused.
fn parse_video_id(token: &str) -> Result<String, RequestError> {
    let bad = token.contains(['/', '\\', '\0']) || token.contains("..");
    if bad {
        return Err(RequestError::InvalidVideoId(token.to_owned()));
    }
    Ok(token.to_owned())
}

// =============================================================================
// NAMING
// =============================================================================

/// Zero-padded chunk index as used in storage names, e.g. `7` → `00007`.
#[must_use]
pub fn padded_index(chunk_index: u64) -> String {
    format!("{chunk_index:05}")
}

/// True when a chunk reply carries the miss marker instead of media bytes.
#[must_use]
pub fn is_chunk_miss(payload: &[u8]) -> bool {
    payload == CHUNK_NOT_FOUND.as_bytes()
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
