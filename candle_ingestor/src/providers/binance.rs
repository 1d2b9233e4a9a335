use async_trait::async_trait;
use governor::Quota;
use nonzero_ext::nonzero;
use serde_json::Value;
use tracing::debug;

use crate::{
    models::{
        candle::{OHLCV_ARITY, OhlcvRow},
        request_params::CandleRequest,
        timeframe::{TimeFrame, TimeFrameUnit},
    },
    providers::{CandleSource, ProviderError, ProviderInitError, RestTransport, ValidationSnafu, numeric},
};

const BASE_URL: &str = "https://api.binance.com";
const KLINES_PATH: &str = "/api/v3/klines";
const MAX_LIMIT: usize = 1000;

/// Binance spot klines.
///
/// Each kline is `[open_time, "open", "high", "low", "close", "volume", close_time, ...]`,
/// oldest first; only the first six fields are kept.
pub struct BinanceSource {
    transport: RestTransport,
}

impl BinanceSource {
    pub fn new() -> Result<Self, ProviderInitError> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderInitError> {
        Ok(Self {
            transport: RestTransport::new(base_url, Quota::per_second(nonzero!(20u32)))?,
        })
    }
}

pub(crate) fn interval(tf: &TimeFrame) -> Result<String, ProviderError> {
    let supported = match tf.unit {
        TimeFrameUnit::Minute => [1, 3, 5, 15, 30].contains(&tf.amount),
        TimeFrameUnit::Hour => [1, 2, 4, 6, 8, 12].contains(&tf.amount),
        TimeFrameUnit::Day => [1, 3].contains(&tf.amount),
        TimeFrameUnit::Week | TimeFrameUnit::Month => tf.amount == 1,
    };
    if !supported {
        return ValidationSnafu { message: format!("binance has no {tf} interval") }.fail();
    }
    Ok(tf.to_string())
}

#[async_trait]
impl CandleSource for BinanceSource {
    async fn fetch_ohlcv(&self, request: &CandleRequest) -> Result<Vec<OhlcvRow>, ProviderError> {
        let query = [
            ("symbol", request.pair.concatenated()),
            ("interval", interval(&request.timeframe)?),
            ("limit", request.limit.clamp(1, MAX_LIMIT).to_string()),
        ];
        let klines: Vec<Vec<Value>> = self.transport.get_json(KLINES_PATH, &query).await?;
        debug!(exchange = "binance", rows = klines.len(), "fetched klines");

        klines
            .iter()
            .map(|kline| {
                kline
                    .iter()
                    .take(OHLCV_ARITY)
                    .map(numeric)
                    .collect::<Result<OhlcvRow, _>>()
            })
            .collect()
    }
}
