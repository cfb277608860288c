//! Backtesting engine — bar-by-bar tick drivers and accounting.
//!
//! The engine owns cash, positions, the swap and trade logs, and the
//! equity curve, and drives one of two loops:
//!
//! 1. Single-symbol: the main timeframe's streamed buffer supplies bars;
//!    other preloaded timeframes stream alongside.
//! 2. All-symbols: ticks are enumerated from the calendar, symbols join a
//!    tick when they have a fresh bar for it, and long-missing symbols
//!    are treated as delisted.
//!
//! Exactly one bar is ever in flight; between bars the engine may await
//! the datastore. State therefore needs no lock.

pub mod accounting;
pub mod clock;
pub mod context;
mod multi;
mod single;

pub use accounting::OrderError;
pub use context::{BarContext, SymbolBar, UniverseContext};

use crate::broker::Broker;
use crate::data::source::{CandleSource, DataError};
use crate::domain::{EquityPoint, Swap, Timeframe, Trade};
use crate::metrics::Metrics;
use crate::strategy::ConfigError;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Consecutive missing bars a held symbol survives before its position
/// is silently zeroed in all-symbols mode.
pub const DELIST_TOLERANCE_BARS: u32 = 10;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("lookahead violation: candles requested at {requested} while the clock is at {current}")]
    LookaheadViolation { requested: i64, current: i64 },

    #[error("strategy failed: {0}")]
    Strategy(String),
}

/// Engine construction parameters. Validated up front; a run never starts
/// from a bad configuration.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start_ms: i64,
    pub end_ms: i64,
    pub start_cash: f64,
    /// Emit tracing events for orders and run progress.
    pub logs: bool,
    /// Collect feature vectors and compute feature/profit correlations.
    pub features: bool,
}

impl BacktestConfig {
    pub fn new(start_ms: i64, end_ms: i64, start_cash: f64) -> Result<Self, ConfigError> {
        if end_ms <= start_ms {
            return Err(ConfigError::InvalidDateRange {
                start: start_ms,
                end: end_ms,
            });
        }
        if !(start_cash > 0.0) {
            return Err(ConfigError::NonPositiveCash(start_cash));
        }
        Ok(Self {
            start_ms,
            end_ms,
            start_cash,
            logs: false,
            features: false,
        })
    }

    pub fn with_logs(mut self, logs: bool) -> Self {
        self.logs = logs;
        self
    }

    pub fn with_features(mut self, features: bool) -> Self {
        self.features = features;
        self
    }
}

/// The backtest engine: accounting state plus the collaborators needed to
/// drive a run.
pub struct Backtest {
    pub(crate) config: BacktestConfig,
    pub(crate) broker: Box<dyn Broker>,
    pub(crate) source: Arc<dyn CandleSource>,

    pub(crate) cash_balance: f64,
    pub(crate) stock_balances: HashMap<String, u64>,
    pub(crate) stock_prices: HashMap<String, f64>,
    pub(crate) hold_since: HashMap<String, i64>,
    pub(crate) stock_features: HashMap<String, Vec<f64>>,
    /// Features staged by `set_features`, consumed by the next opening
    /// buy on the ticker.
    pub(crate) pending_features: HashMap<String, Vec<f64>>,
    pub(crate) swaps: Vec<Swap>,
    pub(crate) trades: Vec<Trade>,
    pub(crate) equity_curve: Vec<EquityPoint>,
    pub(crate) delist_counter: HashMap<String, u32>,
    pub(crate) total_fees: f64,
}

impl Backtest {
    pub fn new(
        config: BacktestConfig,
        broker: Box<dyn Broker>,
        source: Arc<dyn CandleSource>,
    ) -> Self {
        let cash = config.start_cash;
        Self {
            config,
            broker,
            source,
            cash_balance: cash,
            stock_balances: HashMap::new(),
            stock_prices: HashMap::new(),
            hold_since: HashMap::new(),
            stock_features: HashMap::new(),
            pending_features: HashMap::new(),
            swaps: Vec::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            delist_counter: HashMap::new(),
            total_fees: 0.0,
        }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn cash_balance(&self) -> f64 {
        self.cash_balance
    }

    pub fn stock_balance(&self, ticker: &str) -> u64 {
        self.stock_balances.get(ticker).copied().unwrap_or(0)
    }

    pub fn stock_balances(&self) -> &HashMap<String, u64> {
        &self.stock_balances
    }

    pub fn hold_since(&self, ticker: &str) -> Option<i64> {
        self.hold_since.get(ticker).copied()
    }

    pub fn swaps(&self) -> &[Swap] {
        &self.swaps
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn total_fees(&self) -> f64 {
        self.total_fees
    }

    pub(crate) fn push_equity(&mut self, timestamp: i64) {
        let total_value = self.total_value();
        self.equity_curve.push(EquityPoint {
            timestamp,
            total_value,
            cash_balance: self.cash_balance,
        });
    }

    pub(crate) fn metrics(&self, main_timeframe: Timeframe) -> Metrics {
        Metrics::compute(
            &self.equity_curve,
            &self.trades,
            self.config.start_cash,
            self.config.start_ms,
            self.config.end_ms,
            main_timeframe,
            self.config.features,
        )
    }
}
