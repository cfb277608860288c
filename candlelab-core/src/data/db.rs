//! Production datastore client.
//!
//! The candle store is a columnar time-series database that speaks the
//! Postgres wire protocol (one table per timeframe, partitioned by
//! timestamp, deduplicated on `(timestamp, ticker)`), plus an HTTP CSV
//! export endpoint used to stream whole-universe scans that would be
//! wasteful to pull row-by-row over the SQL connection.

use crate::data::export::ExportRows;
use crate::data::source::{CandleSource, DataError};
use crate::domain::{Candle, Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use futures::StreamExt;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use url::Url;

const DEFAULT_QUERY_TIMEOUT_MS: u64 = 30_000;

/// Connection settings, environment-driven. Only credentials and
/// endpoints live here; no engine behavior is configured this way.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Postgres-wire connection string.
    pub url: String,
    /// Base URL of the CSV export endpoint, when deployed.
    pub export_url: Option<String>,
    pub query_timeout: Duration,
}

impl DbConfig {
    /// Read `CANDLEDB_URL` (required), `CANDLEDB_EXPORT_URL` and
    /// `CANDLEDB_QUERY_TIMEOUT_MS` (optional) from the environment.
    pub fn from_env() -> Result<Self, DataError> {
        let url =
            std::env::var("CANDLEDB_URL").map_err(|_| DataError::MissingEnv("CANDLEDB_URL"))?;
        let export_url = std::env::var("CANDLEDB_EXPORT_URL").ok();
        let timeout_ms = std::env::var("CANDLEDB_QUERY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_QUERY_TIMEOUT_MS);
        Ok(Self {
            url,
            export_url,
            query_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// `CandleSource` backed by the production datastore.
pub struct CandleDb {
    pool: PgPool,
    http: reqwest::Client,
    config: DbConfig,
}

impl CandleDb {
    /// Connect with a small bounded pool: only one logical reader is ever
    /// outstanding except during parallel prefetch rounds.
    pub async fn connect(config: DbConfig) -> Result<Self, DataError> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(config.query_timeout)
            .connect(&config.url)
            .await?;
        let http = reqwest::Client::builder()
            .timeout(config.query_timeout)
            .build()?;
        Ok(Self { pool, http, config })
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, DataError>
    where
        F: Future<Output = Result<T, DataError>>,
    {
        tokio::time::timeout(self.config.query_timeout, fut)
            .await
            .map_err(|_| DataError::Timeout(self.config.query_timeout))?
    }

    /// Stream a whole-universe scan through the CSV export endpoint.
    async fn export_scan(
        &self,
        base: &str,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<(String, Candle)>, DataError> {
        let sql = format!(
            "SELECT * FROM {} WHERE timestamp >= '{}' AND timestamp <= '{}' ORDER BY timestamp ASC",
            timeframe.table(),
            ms_to_naive(start_ms).format("%Y-%m-%dT%H:%M:%S%.6fZ"),
            ms_to_naive(end_ms).format("%Y-%m-%dT%H:%M:%S%.6fZ"),
        );
        let mut url = Url::parse(base)
            .and_then(|u| u.join("exp"))
            .map_err(|e| DataError::Other(format!("bad export url: {e}")))?;
        url.query_pairs_mut().append_pair("query", &sql);

        let response = self.http.get(url).send().await?.error_for_status()?;
        let mut stream = response.bytes_stream();
        let mut rows = ExportRows::new();
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            rows.feed(&chunk?, &mut out)?;
        }
        rows.finish(&mut out)?;
        Ok(out)
    }
}

#[async_trait]
impl CandleSource for CandleDb {
    async fn candles_between(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>, DataError> {
        let sql = format!(
            "SELECT open, high, low, close, volume, transactions, timestamp \
             FROM {} WHERE ticker = $1 AND timestamp >= $2 AND timestamp < $3 \
             ORDER BY timestamp ASC",
            timeframe.table()
        );
        self.timed(async {
            let rows = sqlx::query(&sql)
                .bind(ticker)
                .bind(ms_to_naive(start_ms))
                .bind(ms_to_naive(end_ms))
                .fetch_all(&self.pool)
                .await?;
            rows.iter().map(candle_fields).collect()
        })
        .await
    }

    async fn candles_after(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        start_ms: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, DataError> {
        let sql = format!(
            "SELECT open, high, low, close, volume, transactions, timestamp \
             FROM {} WHERE ticker = $1 AND timestamp >= $2 \
             ORDER BY timestamp ASC LIMIT $3",
            timeframe.table()
        );
        self.timed(async {
            let rows = sqlx::query(&sql)
                .bind(ticker)
                .bind(ms_to_naive(start_ms))
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?;
            rows.iter().map(candle_fields).collect()
        })
        .await
    }

    async fn candles_before(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        end_ms: i64,
        floor_ms: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, DataError> {
        let sql = format!(
            "SELECT open, high, low, close, volume, transactions, timestamp \
             FROM {} WHERE ticker = $1 AND timestamp <= $2 AND timestamp >= $3 \
             ORDER BY timestamp DESC LIMIT $4",
            timeframe.table()
        );
        self.timed(async {
            let rows = sqlx::query(&sql)
                .bind(ticker)
                .bind(ms_to_naive(end_ms))
                .bind(ms_to_naive(floor_ms))
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?;
            rows.iter().map(candle_fields).collect()
        })
        .await
    }

    async fn universe_between(
        &self,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<HashMap<String, Vec<Candle>>, DataError> {
        let tagged = match &self.config.export_url {
            Some(base) => self.export_scan(base, timeframe, start_ms, end_ms).await?,
            None => {
                let sql = format!(
                    "SELECT ticker, open, high, low, close, volume, transactions, timestamp \
                     FROM {} WHERE timestamp >= $1 AND timestamp <= $2 \
                     ORDER BY timestamp ASC",
                    timeframe.table()
                );
                self.timed(async {
                    let rows = sqlx::query(&sql)
                        .bind(ms_to_naive(start_ms))
                        .bind(ms_to_naive(end_ms))
                        .fetch_all(&self.pool)
                        .await?;
                    rows.iter()
                        .map(|row| {
                            let ticker: String = row.try_get("ticker")?;
                            Ok((ticker, candle_fields(row)?))
                        })
                        .collect::<Result<Vec<_>, DataError>>()
                })
                .await?
            }
        };

        let mut out: HashMap<String, Vec<Candle>> = HashMap::new();
        for (ticker, candle) in tagged {
            out.entry(ticker).or_default().push(candle);
        }
        Ok(out)
    }

    async fn tickers(&self) -> Result<Vec<String>, DataError> {
        self.timed(async {
            let rows = sqlx::query("SELECT DISTINCT ticker FROM candles_1d ORDER BY ticker")
                .fetch_all(&self.pool)
                .await?;
            rows.iter()
                .map(|row| row.try_get::<String, _>("ticker").map_err(DataError::from))
                .collect()
        })
        .await
    }
}

fn candle_fields(row: &PgRow) -> Result<Candle, DataError> {
    let timestamp: NaiveDateTime = row.try_get("timestamp")?;
    Ok(Candle {
        open: row.try_get("open")?,
        high: row.try_get("high")?,
        low: row.try_get("low")?,
        close: row.try_get("close")?,
        volume: row.try_get::<i64, _>("volume")?.max(0) as u64,
        // Some ingest runs lack the column's value; missing reads as zero.
        transactions: row
            .try_get::<Option<i64>, _>("transactions")?
            .unwrap_or(0)
            .max(0) as u64,
        timestamp: timestamp.and_utc().timestamp_millis(),
    })
}

fn ms_to_naive(ms: i64) -> NaiveDateTime {
    DateTime::from_timestamp_millis(ms)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_naive_round_trip() {
        let ms = 1_700_000_000_123;
        assert_eq!(ms_to_naive(ms).and_utc().timestamp_millis(), ms);
    }

    #[test]
    fn config_timeout_defaults() {
        // from_env without the vars set fails on the required URL.
        std::env::remove_var("CANDLEDB_URL");
        assert!(matches!(
            DbConfig::from_env(),
            Err(DataError::MissingEnv("CANDLEDB_URL"))
        ));
    }
}
