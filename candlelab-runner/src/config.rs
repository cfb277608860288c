//! TOML run configuration.
//!
//! Run parameters (dates, cash, broker, strategy) come from a TOML file;
//! datastore credentials come from the environment only and are handled
//! by the core data layer.

use candlelab_core::broker::{Alpaca, Broker, Ibkr, IbkrTier};
use candlelab_core::engine::BacktestConfig;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Top-level run configuration from a TOML file.
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    pub backtest: BacktestSection,
    pub strategy: StrategySection,
}

/// Whether the run drives one ticker or the whole universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Single,
    AllStocks,
}

/// General backtest parameters.
#[derive(Debug, Deserialize)]
pub struct BacktestSection {
    /// Tickers for single mode; ignored in all-stocks mode.
    #[serde(default)]
    pub tickers: Vec<String>,
    /// Inclusive, `YYYY-MM-DD`.
    pub start_date: String,
    /// Exclusive, `YYYY-MM-DD`.
    pub end_date: String,
    #[serde(default = "default_cash")]
    pub start_cash: f64,
    #[serde(default = "default_broker")]
    pub broker: String,
    #[serde(default)]
    pub slippage: f64,
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub logs: bool,
    #[serde(default)]
    pub features: bool,
}

/// Strategy selection: a registered type name plus numeric parameters.
#[derive(Debug, Deserialize)]
pub struct StrategySection {
    #[serde(rename = "type")]
    pub strategy_type: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

fn default_cash() -> f64 {
    100_000.0
}

fn default_broker() -> String {
    "alpaca".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    Parse(String),

    #[error("bad date '{0}' (expected YYYY-MM-DD)")]
    BadDate(String),

    #[error("unknown broker '{0}' (expected alpaca, ibkr_fixed, or ibkr_tiered)")]
    UnknownBroker(String),

    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error(transparent)]
    Engine(#[from] candlelab_core::strategy::ConfigError),
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn start_ms(&self) -> Result<i64, ConfigError> {
        date_ms(&self.backtest.start_date)
    }

    pub fn end_ms(&self) -> Result<i64, ConfigError> {
        date_ms(&self.backtest.end_date)
    }

    /// Validated engine configuration.
    pub fn engine_config(&self) -> Result<BacktestConfig, ConfigError> {
        let config = BacktestConfig::new(self.start_ms()?, self.end_ms()?, self.backtest.start_cash)?
            .with_logs(self.backtest.logs)
            .with_features(self.backtest.features);
        Ok(config)
    }

    /// Instantiate the configured broker policy.
    pub fn build_broker(&self) -> Result<Box<dyn Broker>, ConfigError> {
        let slippage = self.backtest.slippage;
        match self.backtest.broker.as_str() {
            "alpaca" => Ok(Box::new(Alpaca::new().with_slippage(slippage))),
            "ibkr_fixed" => Ok(Box::new(Ibkr::new(IbkrTier::Fixed).with_slippage(slippage))),
            "ibkr_tiered" => Ok(Box::new(Ibkr::new(IbkrTier::Tiered).with_slippage(slippage))),
            other => Err(ConfigError::UnknownBroker(other.to_string())),
        }
    }
}

fn date_ms(date: &str) -> Result<i64, ConfigError> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ConfigError::BadDate(date.to_string()))?;
    Ok(parsed.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_TOML: &str = r#"
[backtest]
tickers = ["AAPL"]
start_date = "2020-01-01"
end_date = "2023-01-01"
start_cash = 25000.0
broker = "ibkr_tiered"
slippage = 0.0005
mode = "all_stocks"
logs = true
features = true

[strategy]
type = "sma_cross"

[strategy.params]
fast = 25
slow = 50
qty = 3
"#;

    const MINIMAL_TOML: &str = r#"
[backtest]
start_date = "2020-01-01"
end_date = "2021-01-01"

[strategy]
type = "sma_cross"
"#;

    #[test]
    fn full_config_parses() {
        let config = RunConfig::from_toml(FULL_TOML).unwrap();
        assert_eq!(config.backtest.tickers, vec!["AAPL"]);
        assert_eq!(config.backtest.mode, RunMode::AllStocks);
        assert_eq!(config.backtest.broker, "ibkr_tiered");
        assert_eq!(config.strategy.params["slow"], 50.0);
        assert!(config.backtest.features);
        assert!(config.build_broker().is_ok());
        assert!(config.engine_config().is_ok());
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = RunConfig::from_toml(MINIMAL_TOML).unwrap();
        assert_eq!(config.backtest.start_cash, 100_000.0);
        assert_eq!(config.backtest.broker, "alpaca");
        assert_eq!(config.backtest.mode, RunMode::Single);
        assert_eq!(config.backtest.slippage, 0.0);
        assert!(!config.backtest.logs);
    }

    #[test]
    fn bad_date_is_rejected() {
        let toml = MINIMAL_TOML.replace("2020-01-01", "01/01/2020");
        let config = RunConfig::from_toml(&toml).unwrap();
        assert!(matches!(config.start_ms(), Err(ConfigError::BadDate(_))));
    }

    #[test]
    fn unknown_broker_is_rejected() {
        let mut config = RunConfig::from_toml(MINIMAL_TOML).unwrap();
        config.backtest.broker = "robinhood".to_string();
        assert!(matches!(
            config.build_broker(),
            Err(ConfigError::UnknownBroker(_))
        ));
    }

    #[test]
    fn inverted_dates_fail_engine_config() {
        let toml = MINIMAL_TOML.replace("2021-01-01", "2019-01-01");
        let config = RunConfig::from_toml(&toml).unwrap();
        assert!(config.engine_config().is_err());
    }
}
