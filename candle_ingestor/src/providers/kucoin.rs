use async_trait::async_trait;
use chrono::{DateTime, Utc};
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

const BASE_URL: &str = "https://api.kucoin.com";
const CANDLES_PATH: &str = "/api/v1/market/candles";
const OK_CODE: &str = "200000";

#[derive(Deserialize, Debug)]
struct KucoinResponse {
    code: String,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

/// KuCoin spot candles. Rows arrive newest first as
/// `["time_secs", "open", "close", "high", "low", "volume", "turnover"]`.
///
/// The endpoint has no `limit` parameter, so the request window is sized to
/// `limit` intervals ending now.
pub struct KucoinSource {
    transport: RestTransport,
}

impl KucoinSource {
    pub fn new() -> Result<Self, ProviderInitError> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderInitError> {
        Ok(Self {
            transport: RestTransport::new(base_url, Quota::per_second(nonzero!(10u32)))?,
        })
    }
}

pub(crate) fn candle_type(tf: &TimeFrame) -> Result<String, ProviderError> {
    let code = match (tf.unit, tf.amount) {
        (TimeFrameUnit::Minute, n @ (1 | 3 | 5 | 15 | 30)) => format!("{n}min"),
        (TimeFrameUnit::Hour, n @ (1 | 2 | 4 | 6 | 8 | 12)) => format!("{n}hour"),
        (TimeFrameUnit::Day, 1) => "1day".to_string(),
        (TimeFrameUnit::Week, 1) => "1week".to_string(),
        (TimeFrameUnit::Month, 1) => "1month".to_string(),
        _ => return ValidationSnafu { message: format!("kucoin has no {tf} candle type") }.fail(),
    };
    Ok(code)
}

/// `[end - (limit + 1) * interval, end]`, with one spare interval for the open candle.
fn request_window(
    end: DateTime<Utc>,
    request: &CandleRequest,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ProviderError> {
    let start = i32::try_from(request.limit.saturating_add(1))
        .ok()
        .and_then(|intervals| request.timeframe.duration().checked_mul(intervals))
        .and_then(|span| end.checked_sub_signed(span));
    match start {
        Some(start) => Ok((start, end)),
        None => ValidationSnafu {
            message: format!(
                "kucoin window of {} x {} candles is out of range",
                request.limit, request.timeframe
            ),
        }
        .fail(),
    }
}

/// Reorders `[t, o, c, h, l, v, ..]` into `[t_ms, o, h, l, c, v]`.
///
/// Short rows are passed through untouched so the normalizer reports them.
fn reorder(candle: &[Value]) -> Result<OhlcvRow, ProviderError> {
    let fields: Vec<f64> = candle.iter().take(OHLCV_ARITY).map(numeric).collect::<Result<_, _>>()?;
    match fields.as_slice() {
        &[t, o, c, h, l, v] => Ok(vec![t * 1000.0, o, h, l, c, v]),
        _ => Ok(fields),
    }
}

#[async_trait]
impl CandleSource for KucoinSource {
    async fn fetch_ohlcv(&self, request: &CandleRequest) -> Result<Vec<OhlcvRow>, ProviderError> {
        let (start, end) = request_window(Utc::now(), request)?;

        let query = [
            ("symbol", request.pair.joined('-')),
            ("type", candle_type(&request.timeframe)?),
            ("startAt", start.timestamp().to_string()),
            ("endAt", end.timestamp().to_string()),
        ];
        let response: KucoinResponse = self.transport.get_json(CANDLES_PATH, &query).await?;
        if response.code != OK_CODE {
            let msg = response.msg.unwrap_or_default();
            return ApiSnafu { message: format!("kucoin code {}: {msg}", response.code) }.fail();
        }
        debug!(exchange = "kucoin", rows = response.data.len(), "fetched candles");

        response.data.iter().rev().map(|candle| reorder(candle)).collect()
    }
}
