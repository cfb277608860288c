//! Single-symbol tick loop.

use crate::data::buffer::CandleBuffer;
use crate::data::source::DataError;
use crate::domain::TimeframeMap;
use crate::engine::context::BarContext;
use crate::engine::{Backtest, EngineError};
use crate::metrics::Metrics;
use crate::strategy::Strategy;
use futures::future::try_join_all;
use tracing::debug;

impl Backtest {
    /// Replay the strategy bar-by-bar over one ticker's main-timeframe
    /// candles.
    ///
    /// Every preloaded timeframe gets a streaming buffer. The loop starts
    /// at index `lookback − 1` (the first bar with a full window) and
    /// runs until the buffered series is exhausted or a bar reaches the
    /// end date. Each bar: all buffers are topped up in parallel, the
    /// price map is marked, the callback runs, and the equity curve gets
    /// one point.
    pub async fn run_on_stock(
        &mut self,
        strategy: &mut dyn Strategy,
        ticker: &str,
    ) -> Result<Metrics, EngineError> {
        let spec = strategy.spec().clone();
        let main_tf = spec.main_timeframe();
        let lookback = spec.main_lookback();

        let mut buffers: TimeframeMap<Option<CandleBuffer>> = TimeframeMap::default();
        for (tf, frame) in spec.frames() {
            if frame.preload {
                buffers[tf] = Some(CandleBuffer::new(
                    self.source.clone(),
                    ticker,
                    tf,
                    self.config.start_ms,
                    self.config.end_ms,
                    frame.count,
                ));
            }
        }
        ensure_all(&mut buffers, self.config.start_ms).await?;

        let mut index = lookback - 1;
        loop {
            let candle = match buffers[main_tf].as_ref().and_then(|b| b.get(index)) {
                Some(candle) => candle,
                None => break,
            };
            if candle.timestamp >= self.config.end_ms {
                break;
            }
            ensure_all(&mut buffers, candle.timestamp).await?;

            self.stock_prices.insert(ticker.to_string(), candle.close);
            let balance = self.stock_balance(ticker);
            let mut ctx = BarContext::new(self, &mut buffers, ticker, candle, balance);
            strategy.on_bar(&mut ctx).await?;

            self.push_equity(candle.timestamp);
            index += 1;
        }

        if self.config.logs {
            debug!(
                ticker,
                bars = self.equity_curve.len(),
                trades = self.trades.len(),
                "single-symbol run complete"
            );
        }
        Ok(self.metrics(main_tf))
    }
}

/// Top up every buffer for the current timestamp. Prefetches are issued
/// concurrently and joined before the bar proceeds.
async fn ensure_all(
    buffers: &mut TimeframeMap<Option<CandleBuffer>>,
    current_ts: i64,
) -> Result<(), DataError> {
    try_join_all(
        buffers
            .iter_mut()
            .filter_map(|(_, slot)| slot.as_mut())
            .map(|buffer| buffer.ensure(current_ts)),
    )
    .await?;
    Ok(())
}
