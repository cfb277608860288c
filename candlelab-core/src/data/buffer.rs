//! Streaming prefetch window over one ticker's candles.
//!
//! Strategies only ever need a bounded trailing window, so loading a full
//! history eagerly (millions of bars for a year of 1-minute data) would
//! dominate memory. The buffer pulls chunks of `lookback × PREFETCH_FACTOR`
//! candles from the datastore as the simulation clock approaches the end
//! of what it has, and answers lookback requests from what is buffered.

use crate::data::source::{CandleSource, DataError};
use crate::domain::{Candle, Timeframe};
use std::sync::Arc;
use thiserror::Error;

/// Chunk size multiplier: each fetch loads this many lookback windows.
pub const PREFETCH_FACTOR: usize = 10;

/// Fewer candles are buffered at the requested timestamp than the window
/// asks for. A normal early-series condition, not a fault.
#[derive(Debug, Error)]
#[error("only {available} of {requested} candles available at {at}")]
pub struct InsufficientLookback {
    pub requested: usize,
    pub available: usize,
    pub at: i64,
}

/// Append-only, time-ordered candle window with a streaming cursor.
pub struct CandleBuffer {
    source: Arc<dyn CandleSource>,
    ticker: String,
    timeframe: Timeframe,
    end_ms: i64,
    lookback: usize,
    prefetch: usize,
    buffer: Vec<Candle>,
    /// Where the next chunk begins; strictly greater than the last
    /// buffered timestamp.
    next_ts: i64,
    done: bool,
}

impl CandleBuffer {
    /// The first fetch starts one lookback window before `start_ms` so
    /// the window is already full at the first simulated bar.
    pub fn new(
        source: Arc<dyn CandleSource>,
        ticker: impl Into<String>,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
        lookback: usize,
    ) -> Self {
        let pre_roll = lookback as i64 * timeframe.granularity_ms();
        Self {
            source,
            ticker: ticker.into(),
            timeframe,
            end_ms,
            lookback,
            prefetch: lookback * PREFETCH_FACTOR,
            buffer: Vec::new(),
            next_ts: start_ms - pre_roll,
            done: false,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Candle> {
        self.buffer.get(index).copied()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.buffer
    }

    fn needs_fetch(&self, current_ts: i64) -> bool {
        match self.buffer.last() {
            None => true,
            Some(last) => {
                let window = self.lookback as i64 * self.timeframe.granularity_ms();
                current_ts >= last.timestamp - window
            }
        }
    }

    /// Extend the buffer until `current_ts` sits more than one lookback
    /// window before the last buffered bar, or the series is exhausted.
    /// Idempotent: a call after a sufficient one fetches nothing.
    pub async fn ensure(&mut self, current_ts: i64) -> Result<(), DataError> {
        while !self.done && self.needs_fetch(current_ts) {
            let want = self.prefetch;
            let chunk = self
                .source
                .candles_after(&self.ticker, self.timeframe, self.next_ts, want)
                .await?;
            for candle in &chunk {
                if let Some(last) = self.buffer.last() {
                    if candle.timestamp <= last.timestamp {
                        return Err(DataError::OutOfOrder {
                            prev: last.timestamp,
                            next: candle.timestamp,
                        });
                    }
                }
                self.buffer.push(*candle);
            }
            if let Some(last) = self.buffer.last() {
                self.next_ts = last.timestamp + 1;
            }
            if chunk.len() < want || self.next_ts >= self.end_ms {
                self.done = true;
            }
        }
        Ok(())
    }

    /// The last `count` candles with `timestamp <= current_ts`,
    /// **newest first**.
    pub fn get_last(
        &self,
        count: usize,
        current_ts: i64,
    ) -> Result<Vec<Candle>, InsufficientLookback> {
        let upto = self.buffer.partition_point(|c| c.timestamp <= current_ts);
        if upto < count {
            return Err(InsufficientLookback {
                requested: count,
                available: upto,
                at: current_ts,
            });
        }
        Ok(self.buffer[upto - count..upto].iter().rev().copied().collect())
    }
}
