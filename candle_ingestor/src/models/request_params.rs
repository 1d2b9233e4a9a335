use crate::models::{pair::TradingPair, timeframe::TimeFrame};

/// Vendor-agnostic parameters for one candle fetch.
///
/// Every [`CandleSource`](crate::providers::CandleSource) receives the same request
/// within a fetch cycle; translating the pair and timeframe into the exchange's own
/// vocabulary is the source's job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandleRequest {
    /// Pair to fetch, e.g. `ETH/USDT`.
    pub pair: TradingPair,

    /// Candle interval, e.g. 1 minute.
    pub timeframe: TimeFrame,

    /// How many of the most recent candles to keep.
    pub limit: usize,
}
