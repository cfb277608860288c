//! Datastore abstraction and structured error types.
//!
//! The `CandleSource` trait abstracts over the external candle store so
//! the engine can run against the production database, or an in-memory
//! source in tests, without caring which.

use crate::domain::{Candle, Timeframe};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Structured error types for datastore operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("datastore query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("datastore request timed out after {0:?}")]
    Timeout(Duration),

    #[error("export endpoint error: {0}")]
    Export(#[from] reqwest::Error),

    #[error("malformed export row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("candles arrived out of order: {prev} then {next}")]
    OutOfOrder { prev: i64, next: i64 },

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("data error: {0}")]
    Other(String),
}

/// Read-only view over the external candle store.
///
/// All timestamps are epoch milliseconds UTC. Results are ascending by
/// timestamp unless a method says otherwise.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Candles for one ticker with `start_ms <= timestamp < end_ms`.
    async fn candles_between(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>, DataError>;

    /// Up to `limit` candles for one ticker with `timestamp >= start_ms`.
    /// This is the prefetch shape used by the streaming buffer.
    async fn candles_after(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        start_ms: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, DataError>;

    /// Up to `limit` candles with `floor_ms <= timestamp <= end_ms`,
    /// **newest first**. This is the ad-hoc lookback shape.
    async fn candles_before(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        end_ms: i64,
        floor_ms: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, DataError>;

    /// Every ticker's candles with `start_ms <= timestamp <= end_ms`,
    /// grouped by ticker, each group ascending.
    async fn universe_between(
        &self,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<HashMap<String, Vec<Candle>>, DataError>;

    /// Distinct tickers present in the daily table.
    async fn tickers(&self) -> Result<Vec<String>, DataError>;
}
