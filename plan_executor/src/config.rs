//! Pipeline configuration: TOML parsing, defaults, and validation.
//!
//! Every field is optional; an empty file (or no file) yields the stock digest:
//! `ETH/USDT` 1-minute candles, the last 10 per exchange, from Binance, KuCoin and OKX,
//! summarized by a `gpt-4o-mini` "Data Analyst" polled every two seconds.
//!
//! ```toml
//! [market]
//! symbol = "BTC/USDT"
//! timeframe = "5m"
//! exchanges = ["binance", "okx"]
//!
//! [assistant]
//! max_wait_secs = 300
//!
//! [output]
//! artifact_dir = "/var/lib/market-digest"
//! missing_input = { placeholder = "no data" }
//! ```
//!
//! Secrets never live here: the API key is read from the environment variable named
//! by `assistant.api_key_env`.

use std::{collections::HashSet, path::PathBuf, time::Duration};

use anyhow::{Context, bail};
use assistant_client::{AgentSpec, PollPolicy, openai};
use candle_ingestor::{
    CandleRequest, TimeFrame, TradingPair, models::timeframe::TimeFrameError,
    providers::ExchangeId,
};
use serde::{Deserialize, Serialize};
use toml::from_str;

use crate::graph::MissingInputPolicy;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineConfig {
    pub market: MarketCfg,
    pub assistant: AssistantCfg,
    pub output: OutputCfg,
}

/// What to fetch, and from where.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct MarketCfg {
    /// Pair in `BASE/QUOTE` form.
    pub symbol: TradingPair,
    /// ccxt-style interval (`1m`, `15m`, `1h`, `1d`, ...).
    pub timeframe: String,
    /// Most recent candles kept per exchange.
    pub limit: usize,
    /// Exchanges in the order their columns appear in the merged rows.
    pub exchanges: Vec<ExchangeId>,
}

impl Default for MarketCfg {
    fn default() -> Self {
        Self {
            symbol: TradingPair {
                base: "ETH".into(),
                quote: "USDT".into(),
            },
            timeframe: "1m".into(),
            limit: 10,
            exchanges: vec![ExchangeId::Binance, ExchangeId::Kucoin, ExchangeId::Okx],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AssistantCfg {
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub poll_interval_secs: u64,
    /// Upper bound on polling one run; `0` waits indefinitely.
    pub max_wait_secs: u64,
}

impl Default for AssistantCfg {
    fn default() -> Self {
        Self {
            name: "Data Analyst".into(),
            instructions: "You are a professional data analyst. You are good at analyzing \
                           data and building comparison tables. Answer in Markdown."
                .into(),
            model: "gpt-4o-mini".into(),
            base_url: openai::BASE_URL.into(),
            api_key_env: openai::API_KEY_ENV.into(),
            poll_interval_secs: 2,
            max_wait_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct OutputCfg {
    /// Directory the documents are written to; created on first write.
    pub artifact_dir: PathBuf,
    pub missing_input: MissingInputPolicy,
}

impl Default for OutputCfg {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("artifacts"),
            missing_input: MissingInputPolicy::Fail,
        }
    }
}

impl PipelineConfig {
    /// Rejects values that would only fail later, at fetch or poll time.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.market.limit == 0 {
            bail!("market.limit must be at least 1");
        }
        if self.market.exchanges.is_empty() {
            bail!("market.exchanges cannot be empty");
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.market.exchanges.iter().find(|id| !seen.insert(**id)) {
            bail!("exchange listed twice: {dup}");
        }
        self.market
            .timeframe
            .parse::<TimeFrame>()
            .with_context(|| format!("market.timeframe `{}`", self.market.timeframe))?;
        if self.assistant.poll_interval_secs == 0 {
            bail!("assistant.poll_interval_secs must be at least 1");
        }
        if self.assistant.model.trim().is_empty() {
            bail!("assistant.model cannot be empty");
        }
        Ok(())
    }

    pub fn candle_request(&self) -> Result<CandleRequest, TimeFrameError> {
        Ok(CandleRequest {
            pair: self.market.symbol.clone(),
            timeframe: self.market.timeframe.parse()?,
            limit: self.market.limit,
        })
    }

    pub fn agent_spec(&self) -> AgentSpec {
        AgentSpec {
            name: self.assistant.name.clone(),
            instructions: self.assistant.instructions.clone(),
            model: self.assistant.model.clone(),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.assistant.poll_interval_secs),
            max_wait: match self.assistant.max_wait_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

/// Parse and validate a config from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<PipelineConfig> {
    let cfg: PipelineConfig = from_str(toml_str).context("failed to parse pipeline config TOML")?;
    cfg.validate().context("invalid pipeline config")?;
    Ok(cfg)
}

/// Read a config file from disk, then see [`load_config_str`].
pub fn load_config_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<PipelineConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_ingestor::TimeFrameUnit;

    #[test]
    fn empty_file_gives_the_stock_digest() {
        let cfg = load_config_str("").unwrap();
        assert_eq!(cfg, PipelineConfig::default());

        let request = cfg.candle_request().unwrap();
        assert_eq!(request.pair.to_string(), "ETH/USDT");
        assert_eq!(request.timeframe, TimeFrame::new(1, TimeFrameUnit::Minute).unwrap());
        assert_eq!(request.limit, 10);
        assert_eq!(
            cfg.market.exchanges,
            [ExchangeId::Binance, ExchangeId::Kucoin, ExchangeId::Okx]
        );
        assert_eq!(cfg.agent_spec().name, "Data Analyst");
        assert_eq!(cfg.agent_spec().model, "gpt-4o-mini");
        assert_eq!(cfg.poll_policy(), PollPolicy::default());
        assert_eq!(cfg.output.missing_input, MissingInputPolicy::Fail);
    }

    #[test]
    fn overrides_merge_with_defaults() {
        let cfg = load_config_str(
            r#"
            [market]
            symbol = "btc/usdt"
            timeframe = "15m"
            exchanges = ["okx", "binance"]

            [assistant]
            poll_interval_secs = 5
            max_wait_secs = 0

            [output]
            artifact_dir = "/tmp/digest"
            missing_input = { placeholder = "no data" }
            "#,
        )
        .unwrap();

        assert_eq!(cfg.market.symbol.to_string(), "BTC/USDT");
        assert_eq!(cfg.market.limit, 10);
        assert_eq!(cfg.market.exchanges, [ExchangeId::Okx, ExchangeId::Binance]);
        assert_eq!(cfg.assistant.model, "gpt-4o-mini");
        assert_eq!(cfg.poll_policy().interval, Duration::from_secs(5));
        assert_eq!(cfg.poll_policy().max_wait, None);
        assert_eq!(cfg.output.artifact_dir, PathBuf::from("/tmp/digest"));
        assert_eq!(
            cfg.output.missing_input,
            MissingInputPolicy::Placeholder("no data".into())
        );
    }

    #[test]
    fn fail_policy_spelled_as_a_string() {
        let cfg = load_config_str("[output]\nmissing_input = \"fail\"\n").unwrap();
        assert_eq!(cfg.output.missing_input, MissingInputPolicy::Fail);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = load_config_str("[market]\nsymbols = \"ETH/USDT\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("unknown field"));
    }

    #[test]
    fn bad_values_are_rejected() {
        for (toml, needle) in [
            ("[market]\nlimit = 0\n", "limit"),
            ("[market]\nexchanges = []\n", "cannot be empty"),
            ("[market]\nexchanges = [\"okx\", \"okx\"]\n", "twice"),
            ("[market]\ntimeframe = \"7x\"\n", "timeframe"),
            ("[market]\nexchanges = [\"bitmex\"]\n", "unknown variant"),
            ("[market]\nsymbol = \"ETHUSDT\"\n", "BASE/QUOTE"),
            ("[assistant]\npoll_interval_secs = 0\n", "poll_interval_secs"),
        ] {
            let err = load_config_str(toml).unwrap_err();
            let chain = format!("{err:#}");
            assert!(chain.contains(needle), "{toml:?}: {chain}");
        }
    }
}
