use std::sync::Arc;

use async_trait::async_trait;
use candle_ingestor::{
    CandleMerger, CandleRequest, IngestError, OhlcvRow,
    normalize::NormalizeError,
    providers::{ApiSnafu, CandleSource, ProviderError},
};

const T0: f64 = 1_700_000_040_000.0; // 2023-11-14T22:14:00Z

struct StaticSource(Vec<OhlcvRow>);

#[async_trait]
impl CandleSource for StaticSource {
    async fn fetch_ohlcv(&self, _request: &CandleRequest) -> Result<Vec<OhlcvRow>, ProviderError> {
        Ok(self.0.clone())
    }
}

struct FailingSource;

#[async_trait]
impl CandleSource for FailingSource {
    async fn fetch_ohlcv(&self, _request: &CandleRequest) -> Result<Vec<OhlcvRow>, ProviderError> {
        ApiSnafu { message: "exchange unavailable" }.fail()
    }
}

fn row(offset_ms: f64, close: f64) -> OhlcvRow {
    vec![T0 + offset_ms, close, close + 1.0, close - 1.0, close, 1.0]
}

fn request(limit: usize) -> CandleRequest {
    CandleRequest {
        pair: "ETH/USDT".parse().unwrap(),
        timeframe: "1m".parse().unwrap(),
        limit,
    }
}

#[tokio::test]
async fn misaligned_sources_produce_the_union_of_minutes() {
    let merger = CandleMerger::new()
        .with_source("binance", Arc::new(StaticSource(vec![row(0.0, 10.0), row(60_000.0, 11.0)])))
        // 30s offset inside the same minutes as binance
        .with_source("okx", Arc::new(StaticSource(vec![row(30_000.0, 20.0), row(90_000.0, 21.0)])))
        .with_source("kucoin", Arc::new(StaticSource(vec![row(60_000.0, 30.0), row(120_000.0, 31.0)])));

    let merged = merger.fetch_merged(&request(2)).await.unwrap();

    // three distinct minutes although each source contributed only two
    assert_eq!(merged.len(), 3);
    let rows: Vec<_> = merged.iter().collect();
    assert_eq!(rows[0].0.to_string(), "2023-11-14T22:14:00+00:00");
    assert_eq!(rows[0].1["okx"].unwrap().close, 20.0);
    assert!(rows[0].1["kucoin"].is_none());
    assert!(rows[2].1["binance"].is_none());
    assert!(rows[2].1["okx"].is_none());
    assert_eq!(rows[2].1["kucoin"].unwrap().close, 31.0);

    let json = merged.to_json_pretty().unwrap();
    assert!(json.contains("\"kucoin\": null"));
}

#[tokio::test]
async fn one_failing_source_aborts_the_fetch() {
    let merger = CandleMerger::new()
        .with_source("binance", Arc::new(StaticSource(vec![row(0.0, 10.0)])))
        .with_source("okx", Arc::new(FailingSource));

    let err = merger.fetch_merged(&request(5)).await.unwrap_err();
    assert!(matches!(err, IngestError::SourceFetch { .. }));
    assert_eq!(err.exchange(), Some("okx"));
}

#[tokio::test]
async fn malformed_rows_abort_the_fetch() {
    let merger = CandleMerger::new()
        .with_source("binance", Arc::new(StaticSource(vec![vec![T0, 1.0, 2.0]])));

    match merger.fetch_merged(&request(5)).await.unwrap_err() {
        IngestError::MalformedData { exchange, source } => {
            assert_eq!(exchange, "binance");
            assert_eq!(source, NormalizeError::MalformedRow { index: 0, arity: 3 });
        }
        other => panic!("expected MalformedData, got {other:?}"),
    }
}

#[tokio::test]
async fn an_empty_merger_is_an_error() {
    let err = CandleMerger::new().fetch_merged(&request(5)).await.unwrap_err();
    assert!(matches!(err, IngestError::NoSources));
}
