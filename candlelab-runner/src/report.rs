//! Self-contained HTML report.
//!
//! One file, no external assets: a metrics table, an inline SVG equity
//! curve, and a trade tape with the biggest winners and losers.

use candlelab_core::domain::{EquityPoint, Trade};
use candlelab_core::metrics::Metrics;

const SVG_WIDTH: f64 = 860.0;
const SVG_HEIGHT: f64 = 240.0;

/// Build the report as a single HTML string.
pub fn build_report(metrics: &Metrics, equity_curve: &[EquityPoint], trades: &[Trade]) -> String {
    let mut html = String::with_capacity(16 * 1024);
    html.push_str(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>CandleLab run report</title>\n<style>\n\
         body { font-family: -apple-system, Helvetica, Arial, sans-serif; margin: 2rem; color: #222; }\n\
         table { border-collapse: collapse; margin: 1rem 0; }\n\
         th, td { border: 1px solid #ccc; padding: 0.35rem 0.8rem; text-align: right; }\n\
         th { background: #f4f4f4; }\n\
         td.sym, th.sym { text-align: left; }\n\
         .loss { color: #b00020; }\n\
         .gain { color: #1b7837; }\n\
         </style>\n</head>\n<body>\n<h1>CandleLab run report</h1>\n",
    );

    push_metrics_table(&mut html, metrics);
    push_equity_svg(&mut html, equity_curve);
    push_trade_tape(&mut html, trades);

    html.push_str("</body>\n</html>\n");
    html
}

fn push_metrics_table(html: &mut String, metrics: &Metrics) {
    html.push_str("<h2>Summary</h2>\n<table>\n");
    let mut row = |name: &str, value: String| {
        html.push_str(&format!(
            "<tr><td class=\"sym\">{name}</td><td>{value}</td></tr>\n"
        ));
    };
    row("Total return", format!("{:+.2}%", metrics.total_return * 100.0));
    row("CAGR", format!("{:+.2}%", metrics.cagr * 100.0));
    row("Sharpe", format!("{:.2}", metrics.sharpe));
    row(
        "Geo annual return",
        format!("{:+.2}%", metrics.geo_annual_return * 100.0),
    );
    row(
        "Max drawdown",
        format!("{:+.2}%", metrics.max_drawdown * 100.0),
    );
    row("Win rate", format!("{:.1}%", metrics.win_rate * 100.0));
    row("Trades", format!("{}", metrics.trade_count));
    row("Final equity", format!("{:.2}", metrics.final_equity));
    html.push_str("</table>\n");

    if let Some(correlations) = &metrics.feature_correlations {
        html.push_str("<h3>Feature correlations</h3>\n<table>\n");
        html.push_str("<tr><th>Feature</th><th>Pearson r</th></tr>\n");
        for (index, r) in correlations.iter().enumerate() {
            let value = match r {
                Some(r) => format!("{r:+.4}"),
                None => "n/a".to_string(),
            };
            html.push_str(&format!("<tr><td>{index}</td><td>{value}</td></tr>\n"));
        }
        html.push_str("</table>\n");
    }
}

fn push_equity_svg(html: &mut String, equity_curve: &[EquityPoint]) {
    html.push_str("<h2>Equity curve</h2>\n");
    if equity_curve.len() < 2 {
        html.push_str("<p>Not enough points to draw a curve.</p>\n");
        return;
    }
    let min = equity_curve
        .iter()
        .map(|p| p.total_value)
        .fold(f64::INFINITY, f64::min);
    let max = equity_curve
        .iter()
        .map(|p| p.total_value)
        .fold(f64::NEG_INFINITY, f64::max);
    let span = (max - min).max(1e-9);

    let mut points = String::new();
    let n = equity_curve.len();
    for (i, point) in equity_curve.iter().enumerate() {
        let x = i as f64 / (n - 1) as f64 * SVG_WIDTH;
        let y = SVG_HEIGHT - (point.total_value - min) / span * (SVG_HEIGHT - 10.0) - 5.0;
        points.push_str(&format!("{x:.1},{y:.1} "));
    }
    html.push_str(&format!(
        "<svg width=\"{SVG_WIDTH}\" height=\"{SVG_HEIGHT}\" \
         viewBox=\"0 0 {SVG_WIDTH} {SVG_HEIGHT}\">\n\
         <rect width=\"100%\" height=\"100%\" fill=\"#fafafa\"/>\n\
         <polyline fill=\"none\" stroke=\"#1f77b4\" stroke-width=\"1.5\" points=\"{}\"/>\n\
         </svg>\n",
        points.trim_end()
    ));
}

fn push_trade_tape(html: &mut String, trades: &[Trade]) {
    html.push_str("<h2>Trade tape</h2>\n");
    if trades.is_empty() {
        html.push_str("<p>No trades.</p>\n");
        return;
    }

    let mut sorted: Vec<&Trade> = trades.iter().collect();
    sorted.sort_by(|a, b| b.profit.partial_cmp(&a.profit).unwrap_or(std::cmp::Ordering::Equal));

    html.push_str(
        "<table>\n<tr><th class=\"sym\">Ticker</th><th>Qty</th><th>Exit price</th>\
         <th>Profit</th><th>Return</th></tr>\n",
    );
    let winners = sorted.iter().take(5).filter(|t| t.profit > 0.0);
    let losers = sorted.iter().rev().take(5).filter(|t| t.profit <= 0.0);
    for trade in winners.chain(losers) {
        let class = if trade.profit > 0.0 { "gain" } else { "loss" };
        html.push_str(&format!(
            "<tr><td class=\"sym\">{}</td><td>{}</td><td>{:.2}</td>\
             <td class=\"{class}\">{:+.2}</td><td class=\"{class}\">{:+.2}%</td></tr>\n",
            escape(&trade.ticker),
            trade.qty,
            trade.price,
            trade.profit,
            trade.profit_percent * 100.0,
        ));
    }
    html.push_str("</table>\n");
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
