//! Human-readable run summary.

use candlelab_core::metrics::Metrics;

/// Render the metrics block the CLI prints after a run.
pub fn render_metrics(metrics: &Metrics) -> String {
    let mut out = String::new();
    out.push_str("── Backtest summary ─────────────────────────\n");
    out.push_str(&format!(
        " Total return        {:>+10.2}%\n",
        metrics.total_return * 100.0
    ));
    out.push_str(&format!(" CAGR                {:>+10.2}%\n", metrics.cagr * 100.0));
    out.push_str(&format!(" Sharpe              {:>10.2}\n", metrics.sharpe));
    out.push_str(&format!(
        " Geo period return   {:>+10.4}%\n",
        metrics.geo_period_return * 100.0
    ));
    out.push_str(&format!(
        " Geo annual return   {:>+10.2}%\n",
        metrics.geo_annual_return * 100.0
    ));
    out.push_str(&format!(
        " Max drawdown        {:>+10.2}%\n",
        metrics.max_drawdown * 100.0
    ));
    out.push_str(&format!(
        " Win rate            {:>10.1}%\n",
        metrics.win_rate * 100.0
    ));
    out.push_str(&format!(" Trades              {:>10}\n", metrics.trade_count));
    out.push_str(&format!(
        " Final equity        {:>10.2}\n",
        metrics.final_equity
    ));

    if let Some(correlations) = &metrics.feature_correlations {
        out.push_str(" Feature correlations:\n");
        if correlations.is_empty() {
            out.push_str("   (no trades carried features)\n");
        }
        for (index, r) in correlations.iter().enumerate() {
            match r {
                Some(r) => out.push_str(&format!("   [{index}] {r:+.4}\n")),
                None => out.push_str(&format!("   [{index}] n/a\n")),
            }
        }
    }
    out
}

/// Print the summary to stdout.
pub fn print_metrics(metrics: &Metrics) {
    print!("{}", render_metrics(metrics));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> Metrics {
        Metrics {
            total_return: 0.1234,
            cagr: 0.08,
            sharpe: 1.31,
            geo_period_return: 0.0004,
            geo_annual_return: 0.105,
            max_drawdown: -0.182,
            avg_daily: 0.0005,
            win_rate: 0.55,
            trade_count: 42,
            final_equity: 112_340.0,
            feature_correlations: Some(vec![Some(0.33), None]),
        }
    }

    #[test]
    fn summary_contains_the_headline_numbers() {
        let text = render_metrics(&metrics());
        assert!(text.contains("+12.34%"));
        assert!(text.contains("1.31"));
        assert!(text.contains("-18.20%"));
        assert!(text.contains("42"));
        assert!(text.contains("[0] +0.3300"));
        assert!(text.contains("[1] n/a"));
    }

    #[test]
    fn summary_without_features_omits_the_block() {
        let mut m = metrics();
        m.feature_correlations = None;
        let text = render_metrics(&m);
        assert!(!text.contains("Feature correlations"));
    }
}
