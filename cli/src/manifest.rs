//! Manifest parsing: reduces an MPD document to its bitrate ladder.
//!
//! Only `Representation` elements and their `bandwidth` attribute matter.
//! Elements are matched by local name so a default or prefixed DASH
//! namespace does not hide them.

use frames::ErrorCode;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::abr::BitrateLadder;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest is not UTF-8 text")]
    NotUtf8,
    #[error("manifest is not well-formed XML: {0}")]
    Xml(String),
    #[error("Representation without a bandwidth attribute")]
    MissingBandwidth,
    #[error("bandwidth `{0}` is not an integer")]
    InvalidBandwidth(String),
    #[error("manifest lists no representations")]
    EmptyLadder,
}

impl ErrorCode for ManifestError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotUtf8 | Self::Xml(_) => "E_MANIFEST_PARSE",
            Self::MissingBandwidth | Self::InvalidBandwidth(_) => "E_MANIFEST_BANDWIDTH",
            Self::EmptyLadder => "E_MANIFEST_EMPTY",
        }
    }
}

/// Decode a manifest reply and extract its ladder.
///
/// # Errors
///
/// [`ManifestError::NotUtf8`] for binary payloads, otherwise as [`parse_ladder`].
pub fn ladder_from_payload(payload: &[u8]) -> Result<BitrateLadder, ManifestError> {
    let xml = std::str::from_utf8(payload).map_err(|_| ManifestError::NotUtf8)?;
    parse_ladder(xml)
}

/// Collect the distinct `bandwidth` values of every `Representation`.
///
/// # Errors
///
/// Malformed XML, a missing or non-integer `bandwidth`, and a manifest with
/// no representations are all errors.
pub fn parse_ladder(xml: &str) -> Result<BitrateLadder, ManifestError> {
    let mut reader = Reader::from_str(xml);
    let mut rates = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Representation" {
                    rates.push(bandwidth_of(&e)?);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ManifestError::Xml(e.to_string())),
        }
    }

    BitrateLadder::new(rates).ok_or(ManifestError::EmptyLadder)
}

fn bandwidth_of(element: &BytesStart<'_>) -> Result<u64, ManifestError> {
    let attr = element
        .try_get_attribute("bandwidth")
        .map_err(|e| ManifestError::Xml(e.to_string()))?
        .ok_or(ManifestError::MissingBandwidth)?;
    let value = attr
        .unescape_value()
        .map_err(|e| ManifestError::Xml(e.to_string()))?;
    value
        .trim()
        .parse()
        .map_err(|_| ManifestError::InvalidBandwidth(value.into_owned()))
}

#[cfg(test)]
#[path = "manifest_test.rs"]
mod tests;
