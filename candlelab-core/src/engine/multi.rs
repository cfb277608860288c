//! All-symbols tick loop.
//!
//! The main timeframe's calendar drives the run. Symbol data is bulk
//! loaded one chunk of ticks at a time; other preloaded timeframes ride
//! along in sliding windows. A symbol participates in a tick only when it
//! has a fresh bar there, and a held symbol that stays missing for more
//! than [`DELIST_TOLERANCE_BARS`] consecutive ticks is treated as
//! delisted: its position silently becomes zero, with no sell and no
//! proceeds.

use crate::data::source::{CandleSource, DataError};
use crate::domain::timeframe::DAY_MS;
use crate::domain::{Candle, Timeframe};
use crate::engine::clock;
use crate::engine::context::{PreloadWindow, SymbolBar, UniverseContext};
use crate::engine::{Backtest, EngineError, DELIST_TOLERANCE_BARS};
use crate::metrics::Metrics;
use crate::store::Stock;
use crate::strategy::Strategy;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

impl Backtest {
    /// Replay the strategy across every symbol in the datastore.
    pub async fn run_on_all_stocks(
        &mut self,
        strategy: &mut dyn Strategy,
    ) -> Result<Metrics, EngineError> {
        let spec = strategy.spec().clone();
        let main_tf = spec.main_timeframe();
        let lookback = spec.main_lookback();

        let all_ticks = clock::ticks(main_tf, self.config.start_ms, self.config.end_ms);
        let mut windows: Vec<PreloadWindow> = spec
            .frames()
            .filter(|(tf, frame)| *tf != main_tf && frame.preload)
            .map(|(tf, frame)| PreloadWindow {
                timeframe: tf,
                count: frame.count,
                end_ms: i64::MIN,
                stocks: HashMap::new(),
            })
            .collect();

        for chunk in all_ticks.chunks(main_tf.chunk_ticks()) {
            let Some((&first, &last)) = chunk.first().zip(chunk.last()) else {
                continue;
            };
            let load_start = first - 2 * lookback as i64 * DAY_MS;
            let load_end = last + 4 * DAY_MS;
            let grouped = self
                .source
                .universe_between(main_tf, load_start, load_end)
                .await?;
            let stocks = build_stocks(grouped, main_tf)?;

            for &tick in chunk {
                if clock::is_weekend(tick) {
                    continue;
                }
                for window in &mut windows {
                    window.refresh(self.source.as_ref(), tick).await?;
                }

                let entries = collect_entries(&stocks, tick);
                for entry in &entries {
                    self.stock_prices
                        .insert(entry.ticker.clone(), entry.candle.close);
                }
                self.apply_delistings(&entries);

                if entries.is_empty() {
                    continue;
                }
                let mut ctx =
                    UniverseContext::new(self, main_tf, tick, entries, &stocks, &windows);
                strategy.on_universe(&mut ctx).await?;
                self.push_equity(tick);
            }
        }

        if self.config.logs {
            debug!(
                ticks = self.equity_curve.len(),
                trades = self.trades.len(),
                "all-symbols run complete"
            );
        }
        Ok(self.metrics(main_tf))
    }

    /// Advance delist counters for held symbols missing from this tick;
    /// reset them for symbols that showed up again.
    fn apply_delistings(&mut self, entries: &[SymbolBar]) {
        let present: HashSet<&str> = entries.iter().map(|e| e.ticker.as_str()).collect();
        let held: Vec<String> = self.stock_balances.keys().cloned().collect();
        for ticker in held {
            if present.contains(ticker.as_str()) {
                self.delist_counter.remove(&ticker);
                continue;
            }
            let missing = self.delist_counter.entry(ticker.clone()).or_insert(0);
            *missing += 1;
            if *missing > DELIST_TOLERANCE_BARS {
                self.stock_balances.remove(&ticker);
                self.hold_since.remove(&ticker);
                self.stock_features.remove(&ticker);
                self.delist_counter.remove(&ticker);
                if self.config.logs {
                    info!(%ticker, "position zeroed after delisting");
                }
            }
        }
    }
}

impl PreloadWindow {
    /// Reload the window when the clock reaches its end: a backward reach
    /// of three lookback windows plus a timeframe-specific forward span.
    pub(crate) async fn refresh(
        &mut self,
        source: &dyn CandleSource,
        now: i64,
    ) -> Result<(), DataError> {
        if now < self.end_ms {
            return Ok(());
        }
        let start = now - 3 * self.count as i64 * self.timeframe.granularity_ms();
        let end = now + self.timeframe.preload_window_ms();
        let grouped = source.universe_between(self.timeframe, start, end).await?;
        self.stocks = build_stocks(grouped, self.timeframe)?;
        self.end_ms = end;
        Ok(())
    }
}

/// Seal per-ticker series into columnar stores.
fn build_stocks(
    grouped: HashMap<String, Vec<Candle>>,
    timeframe: Timeframe,
) -> Result<HashMap<String, Stock>, DataError> {
    let mut stocks = HashMap::with_capacity(grouped.len());
    for (ticker, candles) in grouped {
        let mut stock = Stock::new(ticker.clone(), timeframe);
        for candle in candles {
            stock.push(candle).map_err(|_| DataError::OutOfOrder {
                prev: stock.last_timestamp().unwrap_or(0),
                next: candle.timestamp,
            })?;
        }
        stock.finish();
        stocks.insert(ticker, stock);
    }
    Ok(stocks)
}

/// Symbols with a fresh bar at `tick`: the floor candle must fall inside
/// the tick's own interval, so stale pre-roll bars don't count.
fn collect_entries(stocks: &HashMap<String, Stock>, tick: i64) -> Vec<SymbolBar> {
    let mut entries: Vec<SymbolBar> = stocks
        .iter()
        .filter_map(|(ticker, stock)| {
            bar_at(stock, tick).map(|candle| SymbolBar {
                ticker: ticker.clone(),
                candle,
            })
        })
        .collect();
    entries.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    entries
}

fn bar_at(stock: &Stock, tick: i64) -> Option<Candle> {
    if stock.is_empty() {
        return None;
    }
    let mut row = stock.index_at(tick).min(stock.len() - 1);
    let mut candle = stock.get(row)?;
    if candle.timestamp > tick {
        row = row.checked_sub(1)?;
        candle = stock.get(row)?;
    }
    let granularity = stock.granularity_ms();
    if candle.timestamp <= tick && candle.timestamp > tick - granularity {
        Some(candle)
    } else {
        None
    }
}
