//! Canonical in-memory representation of one exchange's candle (OHLCV).

use serde::{Deserialize, Serialize};

/// A raw OHLCV row as handed over by a source:
/// `[timestamp_ms, open, high, low, close, volume]`.
///
/// Arity is not enforced here; [`normalize_rows`](crate::normalize::normalize_rows)
/// rejects rows that do not carry exactly six fields.
pub type OhlcvRow = Vec<f64>;

/// Number of fields in a well-formed [`OhlcvRow`].
pub const OHLCV_ARITY: usize = 6;

/// A single OHLCV candle attributed to one (source, minute) pair.
///
/// The timestamp is not stored on the candle itself: it is the key of the map
/// the candle lives in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Opening price.
    pub open: f64,

    /// Highest price during the interval.
    pub high: f64,

    /// Lowest price during the interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Base-asset volume traded during the interval.
    pub volume: f64,
}
