//! Multi-exchange candle ingestion.
//!
//! Raw OHLCV rows are pulled from each configured [`CandleSource`](providers::CandleSource),
//! normalized onto a minute-granular [`CanonicalTimestamp`](models::timestamp::CanonicalTimestamp)
//! key by [`normalize`], and joined into one [`MergedSeries`](models::series::MergedSeries)
//! by [`merge`].

pub mod errors;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod providers;

pub use errors::IngestError;
pub use merge::{CandleMerger, merge_sources};
pub use models::{
    candle::{Candle, OhlcvRow},
    pair::TradingPair,
    request_params::CandleRequest,
    series::MergedSeries,
    timeframe::{TimeFrame, TimeFrameUnit},
    timestamp::CanonicalTimestamp,
};
