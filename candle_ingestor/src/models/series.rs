//! The time-aligned, multi-source candle table produced by one fetch cycle.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::{candle::Candle, timestamp::CanonicalTimestamp};

/// One minute of the merged table: every configured source has a slot, `None`
/// when that source had no candle for the minute.
pub type MergedRow = IndexMap<String, Option<Candle>>;

/// Candles from several sources keyed by [`CanonicalTimestamp`], ascending.
///
/// Serializes as `{ "<timestamp>": { "<source>": {..} | null } }`, which is the
/// interchange format handed to prompt construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergedSeries {
    rows: BTreeMap<CanonicalTimestamp, MergedRow>,
}

impl MergedSeries {
    pub(crate) fn from_rows(rows: BTreeMap<CanonicalTimestamp, MergedRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, ts: &CanonicalTimestamp) -> Option<&MergedRow> {
        self.rows.get(ts)
    }

    /// Rows in ascending time order.
    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalTimestamp, &MergedRow)> {
        self.rows.iter()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = &CanonicalTimestamp> {
        self.rows.keys()
    }

    /// Pretty-printed JSON with a two-space indent.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
