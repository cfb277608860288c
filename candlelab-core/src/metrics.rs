//! Performance metrics — pure functions over the equity curve and trade
//! log.
//!
//! Everything here is deterministic: the same inputs produce bit-identical
//! output, so a metrics block can be recomputed from persisted artifacts
//! at any time.

use crate::domain::{EquityPoint, Timeframe, Trade};
use serde::{Deserialize, Serialize};

const MS_PER_YEAR: f64 = 365.0 * 86_400_000.0;

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    /// Final equity over starting cash, minus one.
    pub total_return: f64,
    pub cagr: f64,
    /// Annualized mean-over-σ of per-period returns (population σ).
    pub sharpe: f64,
    pub geo_period_return: f64,
    pub geo_annual_return: f64,
    /// Non-positive fraction: the deepest peak-to-trough loss.
    pub max_drawdown: f64,
    /// Mean per-period return. The name is historical; the period is the
    /// main timeframe's bar, whatever its length.
    pub avg_daily: f64,
    pub win_rate: f64,
    pub trade_count: usize,
    pub final_equity: f64,
    /// Pearson r between each feature index and trade profit percent.
    /// `None` when feature collection was off for the run; an inner
    /// `None` when fewer than two trades carry that index or the
    /// denominator is zero.
    pub feature_correlations: Option<Vec<Option<f64>>>,
}

impl Metrics {
    /// Compute all metrics.
    ///
    /// `start_ms`/`end_ms` are the configured run bounds (they set the
    /// CAGR horizon), and `timeframe` sets the annualization factor.
    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        start_cash: f64,
        start_ms: i64,
        end_ms: i64,
        timeframe: Timeframe,
        with_features: bool,
    ) -> Self {
        let mut curve: Vec<EquityPoint> = equity_curve.to_vec();
        curve.sort_by_key(|p| p.timestamp);
        let values: Vec<f64> = curve.iter().map(|p| p.total_value).collect();
        let returns = period_returns(&values);

        let final_equity = values.last().copied().unwrap_or(start_cash);
        let total_return = if values.len() >= 2 && start_cash > 0.0 {
            final_equity / start_cash - 1.0
        } else {
            0.0
        };
        let years = (end_ms - start_ms) as f64 / MS_PER_YEAR;
        let cagr = if years > 0.0 && total_return > -1.0 && values.len() >= 2 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let periods = timeframe.periods_per_year();
        let mean_ret = mean(&returns);
        let std_ret = population_std(&returns, mean_ret);
        let sharpe = if std_ret > 0.0 {
            (mean_ret / std_ret) * periods.sqrt()
        } else {
            0.0
        };

        let (geo_period_return, geo_annual_return) = geometric_returns(&returns, periods);

        Self {
            total_return,
            cagr,
            sharpe,
            geo_period_return,
            geo_annual_return,
            max_drawdown: max_drawdown(&values),
            avg_daily: mean_ret,
            win_rate: win_rate(trades),
            trade_count: trades.len(),
            final_equity,
            feature_correlations: with_features.then(|| feature_correlations(trades)),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Per-period simple returns `e_i / e_{i-1} - 1`.
fn period_returns(values: &[f64]) -> Vec<f64> {
    if values.len() < 2 {
        return Vec::new();
    }
    values
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Deepest drawdown as a non-positive fraction of the running peak.
pub fn max_drawdown(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mut peak = values[0];
    let mut worst = 0.0_f64;
    for &value in values {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let drawdown = (value - peak) / peak;
            if drawdown < worst {
                worst = drawdown;
            }
        }
    }
    worst
}

/// Geometric per-period and annualized returns. Zero when any period lost
/// the whole stake (the log is undefined there).
fn geometric_returns(returns: &[f64], periods_per_year: f64) -> (f64, f64) {
    if returns.is_empty() || returns.iter().any(|r| 1.0 + r <= 0.0) {
        return (0.0, 0.0);
    }
    let log_mean = returns.iter().map(|r| (1.0 + r).ln()).sum::<f64>() / returns.len() as f64;
    let per_period = log_mean.exp() - 1.0;
    let annual = (1.0 + per_period).powf(periods_per_year) - 1.0;
    (per_period, annual)
}

pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Pearson r per feature index, across the trades that carry the index.
fn feature_correlations(trades: &[Trade]) -> Vec<Option<f64>> {
    let width = trades.iter().map(|t| t.features.len()).max().unwrap_or(0);
    (0..width)
        .map(|k| {
            let pairs: Vec<(f64, f64)> = trades
                .iter()
                .filter_map(|t| t.features.get(k).map(|&x| (x, t.profit_percent)))
                .collect();
            let xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
            let ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
            pearson(&xs, &ys)
        })
        .collect()
}

/// Pearson correlation; `None` under two samples or zero denominator.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() < 2 || xs.len() != ys.len() {
        return None;
    }
    let mx = mean(xs);
    let my = mean(ys);
    let mut num = 0.0;
    let mut dx2 = 0.0;
    let mut dy2 = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        num += dx * dy;
        dx2 += dx * dx;
        dy2 += dy * dy;
    }
    let den = (dx2 * dy2).sqrt();
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
