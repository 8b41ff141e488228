//! Bandwidth estimation and bitrate selection.
//!
//! DESIGN
//! ======
//! The estimate is a single scalar carried by the session from one chunk to
//! the next. After each download the measured throughput is folded in with
//! an exponentially weighted moving average; the next chunk then takes the
//! highest rung that still leaves [`SAFETY_MARGIN`] headroom under the
//! estimate, or the lowest rung when none does.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Estimate every session starts from, in bits/second.
pub const INITIAL_BANDWIDTH_BPS: f64 = 250_000.0;

/// A rung is eligible when `rate * SAFETY_MARGIN <= bandwidth`.
pub const SAFETY_MARGIN: f64 = 1.5;

/// Shortest duration a measurement is divided by. Guards against a zero
/// elapsed time on very fast transfers.
pub const MIN_MEASURE_DURATION: Duration = Duration::from_micros(1);

/// Chunks fetched per session unless configured otherwise.
pub const DEFAULT_CHUNK_COUNT: u64 = 30;

// =============================================================================
// LADDER
// =============================================================================

/// Distinct available bitrates in ascending order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitrateLadder {
    rungs: Vec<u64>,
}

impl BitrateLadder {
    /// Build a ladder from arbitrary rates. Returns `None` when `rates` is empty.
    #[must_use]
    pub fn new(rates: impl IntoIterator<Item = u64>) -> Option<Self> {
        let mut rungs: Vec<u64> = rates.into_iter().collect();
        rungs.sort_unstable();
        rungs.dedup();
        if rungs.is_empty() {
            return None;
        }
        Some(Self { rungs })
    }

    #[must_use]
    pub fn rungs(&self) -> &[u64] {
        &self.rungs
    }

    #[must_use]
    pub fn lowest(&self) -> u64 {
        self.rungs[0]
    }

}

/// Pick the bitrate for the next chunk.
///
/// Highest rung with `rate * SAFETY_MARGIN <= bandwidth`; the lowest rung
/// when nothing qualifies, so the session always makes progress.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn select_bitrate(ladder: &BitrateLadder, bandwidth: f64) -> u64 {
    ladder
        .rungs()
        .iter()
        .rev()
        .copied()
        .find(|&rate| rate as f64 * SAFETY_MARGIN <= bandwidth)
        .unwrap_or_else(|| ladder.lowest())
}

/// Throughput of one download in bits/second.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn measure_bandwidth(bytes: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.max(MIN_MEASURE_DURATION).as_secs_f64();
    (bytes as f64 * 8.0) / secs
}

// =============================================================================
// SMOOTHING
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlphaError {
    #[error("alpha must be a number, got `{0}`")]
    NotANumber(String),
    #[error("alpha must be within [0, 1], got {0}")]
    OutOfRange(f64),
}

/// EWMA smoothing factor in `[0, 1]`. Closer to 1 weights the latest
/// measurement more heavily.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alpha(f64);

impl Alpha {
    /// # Errors
    ///
    /// Returns [`AlphaError::OutOfRange`] for values outside `[0, 1]` or NaN.
    pub fn new(value: f64) -> Result<Self, AlphaError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AlphaError::OutOfRange(value))
        }
    }

    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl FromStr for Alpha {
    type Err = AlphaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| AlphaError::NotANumber(s.to_owned()))?;
        Self::new(value)
    }
}

impl fmt::Display for Alpha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Session-scoped bandwidth estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthEstimator {
    alpha: Alpha,
    bandwidth: f64,
}

impl BandwidthEstimator {
    /// Start from [`INITIAL_BANDWIDTH_BPS`].
    #[must_use]
    pub fn new(alpha: Alpha) -> Self {
        Self::with_initial(alpha, INITIAL_BANDWIDTH_BPS)
    }

    #[must_use]
    pub fn with_initial(alpha: Alpha, bandwidth: f64) -> Self {
        Self { alpha, bandwidth }
    }

    /// Current estimate in bits/second.
    #[must_use]
    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Fold in one measurement and return the new estimate:
    /// `alpha * measured + (1 - alpha) * previous`.
    pub fn update(&mut self, measured: f64) -> f64 {
        let alpha = self.alpha.get();
        self.bandwidth = alpha * measured + (1.0 - alpha) * self.bandwidth;
        self.bandwidth
    }
}

#[cfg(test)]
#[path = "abr_test.rs"]
mod tests;
