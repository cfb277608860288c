//! Momentum rotation, all-symbols.
//!
//! Each session, rank every symbol by its return over the lookback and
//! hold the top N equal-weighted. Symbols that fall out of the top set
//! are sold at that session's close.

use crate::config::ConfigError;
use async_trait::async_trait;
use candlelab_core::domain::Timeframe;
use candlelab_core::engine::{EngineError, UniverseContext};
use candlelab_core::strategy::{Strategy, StrategySpec};
use std::collections::HashMap;

pub struct MomentumRotation {
    spec: StrategySpec,
    lookback: usize,
    hold: usize,
}

impl MomentumRotation {
    pub fn new(lookback: usize, hold: usize) -> Result<Self, ConfigError> {
        let spec = StrategySpec::single(Timeframe::D1, lookback)?;
        Ok(Self {
            spec,
            lookback,
            hold: hold.max(1),
        })
    }
}

#[async_trait]
impl Strategy for MomentumRotation {
    fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    async fn on_universe(&mut self, ctx: &mut UniverseContext<'_>) -> Result<(), EngineError> {
        // Rank symbols with enough history by lookback return.
        let mut ranked: Vec<(String, f64, f64)> = Vec::new();
        for entry in ctx.entries().to_vec() {
            let Some(window) = ctx
                .candles(&entry.ticker, Timeframe::D1, self.lookback, None)
                .await?
            else {
                continue;
            };
            let oldest = window[window.len() - 1].close;
            if oldest <= 0.0 {
                continue;
            }
            let momentum = entry.candle.close / oldest - 1.0;
            ranked.push((entry.ticker.clone(), momentum, entry.candle.close));
        }
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let targets: HashMap<String, f64> = ranked
            .iter()
            .take(self.hold)
            .filter(|(_, momentum, _)| *momentum > 0.0)
            .map(|(ticker, _, close)| (ticker.clone(), *close))
            .collect();

        // Sell holdings that dropped out, at this session's close.
        let closes: HashMap<String, f64> = ctx
            .entries()
            .iter()
            .map(|e| (e.ticker.clone(), e.candle.close))
            .collect();
        let held: Vec<String> = ctx.stock_balances().keys().cloned().collect();
        for ticker in held {
            if targets.contains_key(&ticker) {
                continue;
            }
            // A symbol missing from this session cannot be priced; it
            // stays until it reappears or the delisting rule zeroes it.
            if let Some(&close) = closes.get(&ticker) {
                let balance = ctx.stock_balance(&ticker);
                ctx.sell(&ticker, balance, close)?;
            }
        }

        // Buy new entrants equal-weighted from current cash.
        let new_entries: Vec<(&String, &f64)> = targets
            .iter()
            .filter(|(ticker, _)| ctx.stock_balance(ticker) == 0)
            .collect();
        if new_entries.is_empty() {
            return Ok(());
        }
        let per_position = ctx.cash_balance() / new_entries.len() as f64;
        for (ticker, &close) in new_entries {
            let qty = (per_position / close).floor() as u64;
            if qty == 0 {
                continue;
            }
            // Leave headroom for fees rather than sizing to the last cent.
            let qty = qty.saturating_sub(1).max(1);
            ctx.buy(ticker, qty, close)?;
        }
        Ok(())
    }
}
