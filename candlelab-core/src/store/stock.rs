//! Per-symbol, per-timeframe columnar candle store.

use crate::domain::{Candle, Timeframe};
use crate::store::column::Column;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("candle timestamp {next} must be strictly after the previous {prev}")]
    OutOfOrder { prev: i64, next: i64 },

    #[error("store is sealed; no further candles may be pushed")]
    Sealed,
}

/// Columnar store of one symbol's candles at one timeframe.
///
/// Rows are strictly ascending by timestamp. The store is populated in
/// time order, sealed once with [`Stock::finish`], and read-only after
/// that. Known-timestamp lookups go through a hash map; nearest-timestamp
/// lookups binary-search the timestamp column.
#[derive(Debug, Clone)]
pub struct Stock {
    ticker: String,
    timeframe: Timeframe,
    open: Column<f64>,
    high: Column<f64>,
    low: Column<f64>,
    close: Column<f64>,
    volume: Column<u64>,
    transactions: Column<u64>,
    timestamps: Column<i64>,
    rows_by_ts: HashMap<i64, usize>,
    sealed: bool,
}

impl Stock {
    pub fn new(ticker: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            ticker: ticker.into(),
            timeframe,
            open: Column::new(),
            high: Column::new(),
            low: Column::new(),
            close: Column::new(),
            volume: Column::new(),
            transactions: Column::new(),
            timestamps: Column::new(),
            rows_by_ts: HashMap::new(),
            sealed: false,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Bar duration in milliseconds.
    pub fn granularity_ms(&self) -> i64 {
        self.timeframe.granularity_ms()
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.timestamps.last()
    }

    /// Append a candle. Timestamps must be strictly ascending.
    pub fn push(&mut self, candle: Candle) -> Result<(), StoreError> {
        if self.sealed {
            return Err(StoreError::Sealed);
        }
        if let Some(prev) = self.timestamps.last() {
            if candle.timestamp <= prev {
                return Err(StoreError::OutOfOrder {
                    prev,
                    next: candle.timestamp,
                });
            }
        }
        let row = self.len();
        self.open.push(candle.open);
        self.high.push(candle.high);
        self.low.push(candle.low);
        self.close.push(candle.close);
        self.volume.push(candle.volume);
        self.transactions.push(candle.transactions);
        self.timestamps.push(candle.timestamp);
        self.rows_by_ts.insert(candle.timestamp, row);
        Ok(())
    }

    /// Seal the store: shrink all columns and reject further pushes.
    pub fn finish(&mut self) {
        self.open.shrink();
        self.high.shrink();
        self.low.shrink();
        self.close.shrink();
        self.volume.shrink();
        self.transactions.shrink();
        self.timestamps.shrink();
        self.sealed = true;
    }

    /// Materialize the candle at `row`, or `None` out of range.
    pub fn get(&self, row: usize) -> Option<Candle> {
        Some(Candle {
            open: self.open.get(row)?,
            high: self.high.get(row)?,
            low: self.low.get(row)?,
            close: self.close.get(row)?,
            volume: self.volume.get(row)?,
            transactions: self.transactions.get(row)?,
            timestamp: self.timestamps.get(row)?,
        })
    }

    /// Row for an exactly-known timestamp.
    pub fn row_at(&self, ts: i64) -> Option<usize> {
        self.rows_by_ts.get(&ts).copied()
    }

    /// Row whose timestamp is `<= ts` and closest to it (an exact match
    /// returns that row). Returns `0` when `ts` precedes every row and
    /// `len()` when it follows every row.
    pub fn index_at(&self, ts: i64) -> usize {
        let timestamps = self.timestamps.as_slice();
        let below_or_eq = timestamps.partition_point(|&t| t <= ts);
        if below_or_eq == 0 {
            return 0;
        }
        match timestamps.last() {
            Some(&last) if last < ts => timestamps.len(),
            _ => below_or_eq - 1,
        }
    }

    /// Candles between the rows resolved for `start_ts` and `end_ts`,
    /// both inclusive.
    pub fn range(&self, start_ts: i64, end_ts: i64) -> Vec<Candle> {
        if self.is_empty() || end_ts < start_ts {
            return Vec::new();
        }
        let first = self.index_at(start_ts).min(self.len() - 1);
        let last = self.index_at(end_ts).min(self.len() - 1);
        (first..=last).filter_map(|row| self.get(row)).collect()
    }

    /// Iterate candles in ascending-time order.
    pub fn candles(&self) -> impl Iterator<Item = Candle> + '_ {
        (0..self.len()).filter_map(move |row| self.get(row))
    }
}
