//! Per-bar contexts handed to the strategy callback.
//!
//! A context exists only for the duration of one bar: it borrows the
//! engine (for orders and balances) and whatever candle material the
//! driving loop holds, and captures the bar's timestamp so the strategy
//! never has to thread it through calls.

use crate::data::buffer::CandleBuffer;
use crate::data::source::CandleSource;
use crate::domain::{Candle, Timeframe, TimeframeMap};
use crate::engine::{Backtest, EngineError, OrderError};
use crate::store::Stock;
use std::collections::HashMap;

/// One symbol's bar at the current tick (all-symbols mode).
#[derive(Debug, Clone)]
pub struct SymbolBar {
    pub ticker: String,
    pub candle: Candle,
}

/// Context for a single-symbol bar.
pub struct BarContext<'a> {
    pub(crate) engine: &'a mut Backtest,
    pub(crate) buffers: &'a mut TimeframeMap<Option<CandleBuffer>>,
    ticker: &'a str,
    candle: Candle,
    /// Share count at the start of the bar, before this bar's orders.
    stock_balance: u64,
}

impl<'a> BarContext<'a> {
    pub(crate) fn new(
        engine: &'a mut Backtest,
        buffers: &'a mut TimeframeMap<Option<CandleBuffer>>,
        ticker: &'a str,
        candle: Candle,
        stock_balance: u64,
    ) -> Self {
        Self {
            engine,
            buffers,
            ticker,
            candle,
            stock_balance,
        }
    }

    pub fn ticker(&self) -> &str {
        self.ticker
    }

    /// The current main-timeframe bar.
    pub fn candle(&self) -> Candle {
        self.candle
    }

    pub fn timestamp(&self) -> i64 {
        self.candle.timestamp
    }

    /// Share count snapshotted at the start of the bar.
    pub fn stock_balance(&self) -> u64 {
        self.stock_balance
    }

    pub fn cash_balance(&self) -> f64 {
        self.engine.cash_balance()
    }

    pub fn total_value(&self) -> f64 {
        self.engine.total_value()
    }

    /// The last `count` candles at `timeframe`, newest first, as of the
    /// current bar. `None` when not enough history exists yet.
    pub async fn candles(
        &mut self,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Option<Vec<Candle>>, EngineError> {
        self.candles_at(timeframe, count, self.candle.timestamp).await
    }

    /// As [`Self::candles`], but as of `at_ms`. Requesting a timestamp
    /// past the current bar is a strategy bug and fails the run.
    pub async fn candles_at(
        &mut self,
        timeframe: Timeframe,
        count: usize,
        at_ms: i64,
    ) -> Result<Option<Vec<Candle>>, EngineError> {
        if at_ms > self.candle.timestamp {
            return Err(EngineError::LookaheadViolation {
                requested: at_ms,
                current: self.candle.timestamp,
            });
        }
        if let Some(buffer) = self.buffers[timeframe].as_ref() {
            return Ok(buffer.get_last(count, at_ms).ok());
        }
        ad_hoc_lookback(self.engine.source.as_ref(), self.ticker, timeframe, count, at_ms).await
    }

    pub fn buy(&mut self, qty: u64, price: f64) -> Result<(), OrderError> {
        let features = self.engine.pending_features.remove(self.ticker);
        self.engine
            .buy(self.ticker, qty, price, self.candle.timestamp, features)
    }

    pub fn sell(&mut self, qty: u64, price: f64) -> Result<(), OrderError> {
        self.engine
            .sell(self.ticker, qty, price, self.candle.timestamp)
    }

    /// Stage a feature vector; the next opening buy on this ticker
    /// attaches it to the position.
    pub fn set_features(&mut self, features: Vec<f64>) {
        self.engine
            .pending_features
            .insert(self.ticker.to_string(), features);
    }
}

/// Context for one tick of the all-symbols loop.
pub struct UniverseContext<'a> {
    pub(crate) engine: &'a mut Backtest,
    main_timeframe: Timeframe,
    timestamp: i64,
    entries: Vec<SymbolBar>,
    /// Raw per-symbol stores for the current chunk's main timeframe.
    stocks: &'a HashMap<String, Stock>,
    /// Sliding preload windows for the other preloaded timeframes.
    windows: &'a [PreloadWindow],
}

impl<'a> UniverseContext<'a> {
    pub(crate) fn new(
        engine: &'a mut Backtest,
        main_timeframe: Timeframe,
        timestamp: i64,
        entries: Vec<SymbolBar>,
        stocks: &'a HashMap<String, Stock>,
        windows: &'a [PreloadWindow],
    ) -> Self {
        Self {
            engine,
            main_timeframe,
            timestamp,
            entries,
            stocks,
            windows,
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Symbols with a fresh bar at this tick, ticker-ordered.
    pub fn entries(&self) -> &[SymbolBar] {
        &self.entries
    }

    /// Raw store access for a symbol at the main timeframe.
    pub fn stock(&self, ticker: &str) -> Option<&Stock> {
        self.stocks.get(ticker)
    }

    pub fn cash_balance(&self) -> f64 {
        self.engine.cash_balance()
    }

    pub fn total_value(&self) -> f64 {
        self.engine.total_value()
    }

    pub fn stock_balance(&self, ticker: &str) -> u64 {
        self.engine.stock_balance(ticker)
    }

    pub fn stock_balances(&self) -> &HashMap<String, u64> {
        self.engine.stock_balances()
    }

    /// The last `count` candles for `ticker` at `timeframe`, newest
    /// first. Preloaded material answers first; anything it cannot serve
    /// falls back to an ad-hoc datastore lookback.
    pub async fn candles(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        count: usize,
        at_ms: Option<i64>,
    ) -> Result<Option<Vec<Candle>>, EngineError> {
        let at_ms = at_ms.unwrap_or(self.timestamp);
        if at_ms > self.timestamp {
            return Err(EngineError::LookaheadViolation {
                requested: at_ms,
                current: self.timestamp,
            });
        }
        if timeframe == self.main_timeframe {
            if let Some(window) = stock_window(self.stocks.get(ticker), count, at_ms) {
                return Ok(Some(window));
            }
        } else if let Some(preload) = self.windows.iter().find(|w| w.timeframe == timeframe) {
            if let Some(window) = stock_window(preload.stocks.get(ticker), count, at_ms) {
                return Ok(Some(window));
            }
        }
        ad_hoc_lookback(self.engine.source.as_ref(), ticker, timeframe, count, at_ms).await
    }

    pub fn buy(&mut self, ticker: &str, qty: u64, price: f64) -> Result<(), OrderError> {
        let features = self.engine.pending_features.remove(ticker);
        self.engine.buy(ticker, qty, price, self.timestamp, features)
    }

    pub fn sell(&mut self, ticker: &str, qty: u64, price: f64) -> Result<(), OrderError> {
        self.engine.sell(ticker, qty, price, self.timestamp)
    }

    /// Stage a feature vector for the next opening buy on `ticker`.
    pub fn set_features(&mut self, ticker: &str, features: Vec<f64>) {
        self.engine
            .pending_features
            .insert(ticker.to_string(), features);
    }
}

/// Sliding all-symbols preload for one non-main timeframe.
pub(crate) struct PreloadWindow {
    pub(crate) timeframe: Timeframe,
    pub(crate) count: usize,
    pub(crate) end_ms: i64,
    pub(crate) stocks: HashMap<String, Stock>,
}

/// Read `count` candles ending at the bar covering `at_ms` from a sealed
/// store, newest first. `None` when the store cannot serve the window.
pub(crate) fn stock_window(stock: Option<&Stock>, count: usize, at_ms: i64) -> Option<Vec<Candle>> {
    let stock = stock?;
    if stock.is_empty() || count == 0 {
        return None;
    }
    let mut row = stock.index_at(at_ms).min(stock.len() - 1);
    if stock.get(row)?.timestamp > at_ms {
        row = row.checked_sub(1)?;
    }
    if row + 1 < count {
        return None;
    }
    (0..count).map(|back| stock.get(row - back)).collect()
}

/// Fetch `2 × count` candles strictly before `at_ms` from the datastore
/// and keep the newest `count`, newest first. `None` when fewer exist.
pub(crate) async fn ad_hoc_lookback(
    source: &dyn CandleSource,
    ticker: &str,
    timeframe: Timeframe,
    count: usize,
    at_ms: i64,
) -> Result<Option<Vec<Candle>>, EngineError> {
    let floor = at_ms - 2 * count as i64 * timeframe.granularity_ms();
    let fetched = source
        .candles_before(ticker, timeframe, at_ms - 1, floor, 2 * count)
        .await?;
    if fetched.len() < count {
        return Ok(None);
    }
    Ok(Some(fetched[..count].to_vec()))
}
