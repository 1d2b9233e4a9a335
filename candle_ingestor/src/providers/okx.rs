use async_trait::async_trait;
use governor::Quota;
use nonzero_ext::nonzero;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    models::{
        candle::{OHLCV_ARITY, OhlcvRow},
        request_params::CandleRequest,
        timeframe::{TimeFrame, TimeFrameUnit},
    },
    providers::{
        ApiSnafu, CandleSource, ProviderError, ProviderInitError, RestTransport, ValidationSnafu,
        numeric,
    },
};

const BASE_URL: &str = "https://www.okx.com";
const CANDLES_PATH: &str = "/api/v5/market/candles";
const MAX_LIMIT: usize = 300;

#[derive(Deserialize, Debug)]
struct OkxResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

/// OKX spot candles. Rows arrive newest first as
/// `["ts", "o", "h", "l", "c", "vol", "volCcy", "volCcyQuote", "confirm"]`.
pub struct OkxSource {
    transport: RestTransport,
}

impl OkxSource {
    pub fn new() -> Result<Self, ProviderInitError> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderInitError> {
        Ok(Self {
            // 40 requests / 2s on the public candles endpoint
            transport: RestTransport::new(base_url, Quota::per_second(nonzero!(20u32)))?,
        })
    }
}

pub(crate) fn bar(tf: &TimeFrame) -> Result<String, ProviderError> {
    let code = match (tf.unit, tf.amount) {
        (TimeFrameUnit::Minute, n @ (1 | 3 | 5 | 15 | 30)) => format!("{n}m"),
        (TimeFrameUnit::Hour, n @ (1 | 2 | 4 | 6 | 12)) => format!("{n}H"),
        (TimeFrameUnit::Day, n @ (1 | 2 | 3)) => format!("{n}D"),
        (TimeFrameUnit::Week, 1) => "1W".to_string(),
        (TimeFrameUnit::Month, n @ (1 | 3)) => format!("{n}M"),
        _ => return ValidationSnafu { message: format!("okx has no {tf} bar") }.fail(),
    };
    Ok(code)
}

#[async_trait]
impl CandleSource for OkxSource {
    async fn fetch_ohlcv(&self, request: &CandleRequest) -> Result<Vec<OhlcvRow>, ProviderError> {
        let query = [
            ("instId", request.pair.joined('-')),
            ("bar", bar(&request.timeframe)?),
            ("limit", request.limit.clamp(1, MAX_LIMIT).to_string()),
        ];
        let response: OkxResponse = self.transport.get_json(CANDLES_PATH, &query).await?;
        if response.code != "0" {
            return ApiSnafu { message: format!("okx code {}: {}", response.code, response.msg) }
                .fail();
        }
        debug!(exchange = "okx", rows = response.data.len(), "fetched candles");

        response
            .data
            .iter()
            .rev()
            .map(|candle| {
                candle
                    .iter()
                    .take(OHLCV_ARITY)
                    .map(numeric)
                    .collect::<Result<OhlcvRow, _>>()
            })
            .collect()
    }
}
