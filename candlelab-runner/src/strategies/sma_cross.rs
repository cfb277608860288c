//! Simple moving-average crossover, single-symbol.
//!
//! Long-only: enter when the fast average crosses above the slow one,
//! exit on the cross back down. A deliberately small strategy that
//! exercises the whole engine surface.

use crate::config::ConfigError;
use async_trait::async_trait;
use candlelab_core::domain::Timeframe;
use candlelab_core::engine::{BarContext, EngineError};
use candlelab_core::strategy::{Strategy, StrategySpec};

pub struct SmaCross {
    spec: StrategySpec,
    fast: usize,
    slow: usize,
    qty: u64,
}

impl SmaCross {
    pub fn new(fast: usize, slow: usize, qty: u64) -> Result<Self, ConfigError> {
        let spec = StrategySpec::single(Timeframe::D1, slow.max(fast))?;
        Ok(Self {
            spec,
            fast,
            slow,
            qty,
        })
    }
}

#[async_trait]
impl Strategy for SmaCross {
    fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    async fn on_bar(&mut self, ctx: &mut BarContext<'_>) -> Result<(), EngineError> {
        let Some(window) = ctx.candles(Timeframe::D1, self.slow).await? else {
            return Ok(());
        };
        let fast_ma = mean_close(&window[..self.fast.min(window.len())]);
        let slow_ma = mean_close(&window);
        let close = ctx.candle().close;

        if ctx.stock_balance() == 0 && fast_ma > slow_ma {
            ctx.buy(self.qty, close)?;
        } else if ctx.stock_balance() > 0 && fast_ma < slow_ma {
            ctx.sell(ctx.stock_balance(), close)?;
        }
        Ok(())
    }
}

fn mean_close(candles: &[candlelab_core::domain::Candle]) -> f64 {
    if candles.is_empty() {
        return 0.0;
    }
    candles.iter().map(|c| c.close).sum::<f64>() / candles.len() as f64
}
