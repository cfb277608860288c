//! In-memory `CandleSource` for tests, benchmarks, and synthetic runs.

use crate::data::source::{CandleSource, DataError};
use crate::domain::{Candle, Timeframe};
use async_trait::async_trait;
use std::collections::HashMap;

/// Candle store held entirely in memory.
///
/// Series are inserted up front (sorted on insert), then the source is
/// shared immutably with the engine: the same lifecycle as the real
/// datastore, minus the network.
#[derive(Debug, Default)]
pub struct MemorySource {
    series: HashMap<(String, Timeframe), Vec<Candle>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a ticker's series at a timeframe.
    pub fn insert_series(
        &mut self,
        ticker: impl Into<String>,
        timeframe: Timeframe,
        mut candles: Vec<Candle>,
    ) {
        candles.sort_by_key(|c| c.timestamp);
        self.series.insert((ticker.into(), timeframe), candles);
    }

    fn get(&self, ticker: &str, timeframe: Timeframe) -> &[Candle] {
        self.series
            .get(&(ticker.to_string(), timeframe))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[async_trait]
impl CandleSource for MemorySource {
    async fn candles_between(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>, DataError> {
        Ok(self
            .get(ticker, timeframe)
            .iter()
            .filter(|c| c.timestamp >= start_ms && c.timestamp < end_ms)
            .copied()
            .collect())
    }

    async fn candles_after(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        start_ms: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, DataError> {
        let series = self.get(ticker, timeframe);
        let from = series.partition_point(|c| c.timestamp < start_ms);
        Ok(series[from..].iter().take(limit).copied().collect())
    }

    async fn candles_before(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        end_ms: i64,
        floor_ms: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, DataError> {
        Ok(self
            .get(ticker, timeframe)
            .iter()
            .rev()
            .filter(|c| c.timestamp <= end_ms && c.timestamp >= floor_ms)
            .take(limit)
            .copied()
            .collect())
    }

    async fn universe_between(
        &self,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<HashMap<String, Vec<Candle>>, DataError> {
        let mut out: HashMap<String, Vec<Candle>> = HashMap::new();
        for ((ticker, tf), series) in &self.series {
            if *tf != timeframe {
                continue;
            }
            let hits: Vec<Candle> = series
                .iter()
                .filter(|c| c.timestamp >= start_ms && c.timestamp <= end_ms)
                .copied()
                .collect();
            if !hits.is_empty() {
                out.insert(ticker.clone(), hits);
            }
        }
        Ok(out)
    }

    async fn tickers(&self) -> Result<Vec<String>, DataError> {
        let mut tickers: Vec<String> = self
            .series
            .keys()
            .filter(|(_, tf)| *tf == Timeframe::D1)
            .map(|(t, _)| t.clone())
            .collect();
        tickers.sort();
        tickers.dedup();
        Ok(tickers)
    }
}
