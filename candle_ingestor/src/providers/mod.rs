//! Exchange abstraction for candle sources.
//!
//! This module defines the [`CandleSource`] trait, the single capability the merger
//! needs from an exchange: "give me the most recent OHLCV rows for this pair and
//! timeframe". Concrete REST implementations live in the submodules and are picked
//! at runtime through [`build_source`] by [`ExchangeId`].
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use candle_ingestor::{CandleRequest, OhlcvRow};
//! use candle_ingestor::providers::{CandleSource, ProviderError};
//!
//! struct Fixed;
//!
//! #[async_trait]
//! impl CandleSource for Fixed {
//!     async fn fetch_ohlcv(&self, _req: &CandleRequest) -> Result<Vec<OhlcvRow>, ProviderError> {
//!         Ok(vec![vec![1_700_000_000_000.0, 1.0, 2.0, 0.5, 1.5, 10.0]])
//!     }
//! }
//! ```

pub mod binance;
pub mod kucoin;
pub mod okx;

use std::{fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use snafu::{Backtrace, ResultExt, Snafu};

use crate::models::{candle::OhlcvRow, request_params::CandleRequest};

/// Fetches raw OHLCV rows from one exchange.
///
/// Rows are returned oldest first as `[timestamp_ms, open, high, low, close, volume]`.
/// Sources do not trim to `limit` or validate arity; both happen in
/// [`normalize_rows`](crate::normalize::normalize_rows).
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn fetch_ohlcv(&self, request: &CandleRequest) -> Result<Vec<OhlcvRow>, ProviderError>;
}

/// Errors that can occur during the creation of a source instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a [`CandleSource`] implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout, undecodable body).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The exchange answered with an error status or error code.
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters cannot be expressed for this exchange.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// The payload was received but could not be turned into rows.
    #[snafu(display("Internal provider error: {message}"))]
    Internal {
        message: String,
        backtrace: Backtrace,
    },
}

/// Exchanges with a built-in [`CandleSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Kucoin,
    Okx,
}

impl ExchangeId {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Kucoin => "kucoin",
            ExchangeId::Okx => "okx",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(ExchangeId::Binance),
            "kucoin" => Ok(ExchangeId::Kucoin),
            "okx" => Ok(ExchangeId::Okx),
            other => Err(format!("unknown exchange: {other}")),
        }
    }
}

/// Build the source for `id` against the exchange's public production endpoint.
pub fn build_source(id: ExchangeId) -> Result<Arc<dyn CandleSource>, ProviderInitError> {
    let source: Arc<dyn CandleSource> = match id {
        ExchangeId::Binance => Arc::new(binance::BinanceSource::new()?),
        ExchangeId::Kucoin => Arc::new(kucoin::KucoinSource::new()?),
        ExchangeId::Okx => Arc::new(okx::OkxSource::new()?),
    };
    Ok(source)
}

/// HTTP plumbing shared by the REST sources: one client plus a request-rate limiter.
pub(crate) struct RestTransport {
    client: Client,
    base_url: String,
    limiter: DefaultDirectRateLimiter,
}

impl RestTransport {
    pub(crate) fn new(base_url: impl Into<String>, quota: Quota) -> Result<Self, ProviderInitError> {
        let client = Client::builder()
            .user_agent(concat!("candle_ingestor/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Waits for a rate-limit permit, then GETs `path` and decodes the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        self.limiter.until_ready().await;

        let url = format!("{}{path}", self.base_url);
        let response = self.client.get(&url).query(query).send().await.context(ReqwestSnafu)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return ApiSnafu { message: format!("{status}: {body}") }.fail();
        }

        response.json::<T>().await.context(ReqwestSnafu)
    }
}

/// Reads a JSON number or numeric string, the two shapes exchanges use for prices.
pub(crate) fn numeric(value: &Value) -> Result<f64, ProviderError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        InternalSnafu { message: format!("expected a numeric field, got {value}") }.build()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_accepts_numbers_and_numeric_strings() {
        assert_eq!(numeric(&json!(1.5)).unwrap(), 1.5);
        assert_eq!(numeric(&json!("2.25")).unwrap(), 2.25);
        assert_eq!(numeric(&json!(1_700_000_000_000_i64)).unwrap(), 1.7e12);
        assert!(matches!(numeric(&json!("abc")), Err(ProviderError::Internal { .. })));
        assert!(matches!(numeric(&json!(null)), Err(ProviderError::Internal { .. })));
    }

    #[test]
    fn exchange_ids_parse_case_insensitively() {
        assert_eq!("Binance".parse::<ExchangeId>().unwrap(), ExchangeId::Binance);
        assert_eq!(" okx ".parse::<ExchangeId>().unwrap(), ExchangeId::Okx);
        assert!("bitstamp".parse::<ExchangeId>().is_err());
        assert_eq!(ExchangeId::Kucoin.to_string(), "kucoin");
    }

    #[test]
    fn registry_builds_every_exchange() {
        for id in [ExchangeId::Binance, ExchangeId::Kucoin, ExchangeId::Okx] {
            assert!(build_source(id).is_ok());
        }
    }
}
