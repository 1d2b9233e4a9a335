//! Fetches every configured source and joins the results on the union of their minutes.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use futures::future::try_join_all;
use indexmap::IndexMap;
use tracing::{debug, info, instrument};

use crate::{
    errors::IngestError,
    models::{
        candle::Candle,
        request_params::CandleRequest,
        series::{MergedRow, MergedSeries},
        timestamp::CanonicalTimestamp,
    },
    normalize::normalize_rows,
    providers::CandleSource,
};

/// Per-source normalized candles, in configured source order.
pub type PerSourceCandles = IndexMap<String, BTreeMap<CanonicalTimestamp, Candle>>;

/// Joins per-source candles on the union of their timestamps.
///
/// Every row carries one slot per source in `per_source`, `None` where that source
/// had no candle. The result does not depend on the order of `per_source` beyond
/// the order sources are listed inside each row.
pub fn merge_sources(per_source: &PerSourceCandles) -> MergedSeries {
    let all_timestamps: BTreeSet<CanonicalTimestamp> =
        per_source.values().flat_map(|candles| candles.keys().copied()).collect();

    let rows = all_timestamps
        .into_iter()
        .map(|ts| {
            let row: MergedRow = per_source
                .iter()
                .map(|(name, candles)| (name.clone(), candles.get(&ts).copied()))
                .collect();
            (ts, row)
        })
        .collect();

    MergedSeries::from_rows(rows)
}

/// A named set of [`CandleSource`]s fetched together in one cycle.
#[derive(Clone, Default)]
pub struct CandleMerger {
    sources: IndexMap<String, Arc<dyn CandleSource>>,
}

impl CandleMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` under `name`. Re-using a name replaces the earlier source
    /// but keeps its position.
    pub fn with_source(mut self, name: impl Into<String>, source: Arc<dyn CandleSource>) -> Self {
        self.sources.insert(name.into(), source);
        self
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Fetches and normalizes every source concurrently.
    ///
    /// The first failing source fails the whole fetch.
    pub async fn fetch_per_source(
        &self,
        request: &CandleRequest,
    ) -> Result<PerSourceCandles, IngestError> {
        if self.sources.is_empty() {
            return Err(IngestError::NoSources);
        }

        let fetches = self.sources.iter().map(|(name, source)| async move {
            let rows = source
                .fetch_ohlcv(request)
                .await
                .map_err(|err| IngestError::SourceFetch { exchange: name.clone(), source: err })?;
            let candles = normalize_rows(&rows, request.limit)
                .map_err(|err| IngestError::MalformedData { exchange: name.clone(), source: err })?;
            debug!(exchange = %name, raw = rows.len(), kept = candles.len(), "normalized source");
            Ok::<_, IngestError>((name.clone(), candles))
        });

        Ok(try_join_all(fetches).await?.into_iter().collect())
    }

    /// Fetches every source and merges the results.
    #[instrument(skip(self), fields(pair = %request.pair, timeframe = %request.timeframe))]
    pub async fn fetch_merged(&self, request: &CandleRequest) -> Result<MergedSeries, IngestError> {
        let per_source = self.fetch_per_source(request).await?;
        let merged = merge_sources(&per_source);
        info!(sources = per_source.len(), rows = merged.len(), "merged candles");
        Ok(merged)
    }
}
