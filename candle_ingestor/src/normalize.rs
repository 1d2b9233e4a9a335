//! Turns one source's raw OHLCV rows into candles keyed by canonical minute.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::{
    candle::{Candle, OHLCV_ARITY, OhlcvRow},
    timestamp::CanonicalTimestamp,
};

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    /// A row did not carry `[timestamp, open, high, low, close, volume]`.
    #[error("row {index} has {arity} fields, expected {OHLCV_ARITY}")]
    MalformedRow { index: usize, arity: usize },

    /// The row's timestamp is not a representable epoch-millisecond instant.
    #[error("row {index} has an out-of-range timestamp {raw}")]
    TimestampOutOfRange { index: usize, raw: f64 },
}

/// Normalizes the last `limit` rows of `rows`.
///
/// Rows before the tail are discarded without being inspected. When two kept rows
/// land on the same minute the later one wins. A single malformed row fails the
/// whole batch.
pub fn normalize_rows(
    rows: &[OhlcvRow],
    limit: usize,
) -> Result<BTreeMap<CanonicalTimestamp, Candle>, NormalizeError> {
    let start = rows.len().saturating_sub(limit);
    let mut out = BTreeMap::new();

    for (index, row) in rows.iter().enumerate().skip(start) {
        let &[ts, open, high, low, close, volume] = row.as_slice() else {
            return Err(NormalizeError::MalformedRow { index, arity: row.len() });
        };
        let key = millis(ts)
            .and_then(CanonicalTimestamp::from_millis)
            .ok_or(NormalizeError::TimestampOutOfRange { index, raw: ts })?;
        out.insert(key, Candle { open, high, low, close, volume });
    }

    Ok(out)
}

fn millis(raw: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound.
    (raw.is_finite() && raw >= i64::MIN as f64 && raw < i64::MAX as f64).then(|| raw as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: f64 = 1_709_296_440_000.0; // 2024-03-01T12:34:00Z

    fn row(ts: f64, close: f64) -> OhlcvRow {
        vec![ts, 1.0, 2.0, 0.5, close, 100.0]
    }

    #[test]
    fn keeps_only_the_tail() {
        let rows: Vec<_> = (0..5).map(|i| row(T0 + 60_000.0 * f64::from(i), f64::from(i))).collect();
        let out = normalize_rows(&rows, 3).unwrap();
        let closes: Vec<f64> = out.values().map(|c| c.close).collect();
        assert_eq!(closes, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn malformed_rows_outside_the_tail_are_ignored() {
        let rows = vec![vec![T0, 1.0], row(T0 + 60_000.0, 1.0)];
        assert_eq!(normalize_rows(&rows, 1).unwrap().len(), 1);
    }

    #[test]
    fn wrong_arity_is_fatal() {
        let rows = vec![row(T0, 1.0), vec![T0 + 60_000.0, 1.0, 2.0, 0.5, 1.5]];
        assert_eq!(
            normalize_rows(&rows, 10),
            Err(NormalizeError::MalformedRow { index: 1, arity: 5 })
        );
    }

    #[test]
    fn sub_minute_offsets_share_a_key_and_the_later_row_wins() {
        let rows = vec![row(T0 + 1_000.0, 1.0), row(T0 + 59_999.0, 2.0)];
        let out = normalize_rows(&rows, 10).unwrap();
        assert_eq!(out.len(), 1);
        let (key, candle) = out.iter().next().unwrap();
        assert_eq!(key.to_string(), "2024-03-01T12:34:00+00:00");
        assert_eq!(candle.close, 2.0);
    }

    #[test]
    fn non_finite_timestamps_are_rejected() {
        let rows = vec![row(f64::NAN, 1.0)];
        assert!(matches!(
            normalize_rows(&rows, 1),
            Err(NormalizeError::TimestampOutOfRange { index: 0, .. })
        ));
    }

    #[test]
    fn zero_limit_yields_nothing() {
        assert!(normalize_rows(&[row(T0, 1.0)], 0).unwrap().is_empty());
    }
}
