//! Result export — JSON and CSV artifact generation.
//!
//! Persisted artifacts carry a `schema_version`; unknown versions are
//! rejected on load so stale tooling fails loudly instead of
//! misinterpreting newer files.

use anyhow::{bail, Context, Result};
use candlelab_core::domain::{EquityPoint, Trade};
use candlelab_core::metrics::Metrics;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// Everything a run leaves behind, in one serializable record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifact {
    pub schema_version: u32,
    pub metrics: Metrics,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
}

impl RunArtifact {
    pub fn new(metrics: Metrics, equity_curve: Vec<EquityPoint>, trades: Vec<Trade>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            metrics,
            equity_curve,
            trades,
        }
    }
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(artifact: &RunArtifact) -> Result<String> {
    serde_json::to_string_pretty(artifact).context("failed to serialize run artifact to JSON")
}

/// Deserialize a run artifact, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunArtifact> {
    let artifact: RunArtifact =
        serde_json::from_str(json).context("failed to deserialize run artifact from JSON")?;
    if artifact.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            artifact.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(artifact)
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Trade tape as CSV.
///
/// Columns: ticker, qty, price, timestamp, fee, profit, profit_percent,
/// features (semicolon-joined).
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "ticker",
        "qty",
        "price",
        "timestamp",
        "fee",
        "profit",
        "profit_percent",
        "features",
    ])?;
    for trade in trades {
        let features = trade
            .features
            .iter()
            .map(f64::to_string)
            .collect::<Vec<_>>()
            .join(";");
        writer.write_record([
            trade.ticker.clone(),
            trade.qty.to_string(),
            trade.price.to_string(),
            trade.timestamp.to_string(),
            trade.fee.to_string(),
            trade.profit.to_string(),
            trade.profit_percent.to_string(),
            features,
        ])?;
    }
    let bytes = writer.into_inner().context("flushing CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

/// Equity curve as CSV: timestamp, total_value, cash_balance.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["timestamp", "total_value", "cash_balance"])?;
    for point in equity_curve {
        writer.write_record([
            point.timestamp.to_string(),
            point.total_value.to_string(),
            point.cash_balance.to_string(),
        ])?;
    }
    let bytes = writer.into_inner().context("flushing CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}
