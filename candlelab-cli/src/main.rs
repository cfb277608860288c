//! CandleLab CLI.
//!
//! Usage:
//!   candlelab run <config.toml> [--report <out.html>]
//!
//! Datastore credentials come from the environment (`CANDLEDB_URL`,
//! optionally `CANDLEDB_EXPORT_URL`, `CANDLEDB_QUERY_TIMEOUT_MS`), loaded
//! from a `.env` file when present.

use anyhow::{bail, Context, Result};
use candlelab_core::data::{CandleDb, DbConfig};
use candlelab_core::engine::Backtest;
use candlelab_runner::config::{RunConfig, RunMode};
use candlelab_runner::report::build_report;
use candlelab_runner::strategies;
use candlelab_runner::summary::print_metrics;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("run") => {
            let (config_path, report_path) = parse_run_args(&args[1..])?;
            run_backtest(&config_path, report_path.as_deref()).await
        }
        Some("--help") | Some("-h") | None => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            bail!("unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("CandleLab — event-driven equity backtesting");
    println!();
    println!("Usage:");
    println!("  candlelab run <config.toml>                 # run a backtest");
    println!("  candlelab run <config.toml> --report out.html");
    println!();
}

fn parse_run_args(args: &[String]) -> Result<(PathBuf, Option<PathBuf>)> {
    let mut config = None;
    let mut report = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--report" => {
                let path = iter.next().context("--report needs a path")?;
                report = Some(PathBuf::from(path));
            }
            other if config.is_none() => config = Some(PathBuf::from(other)),
            other => bail!("unexpected argument: {other}"),
        }
    }
    let config = config.context("missing config file path")?;
    Ok((config, report))
}

async fn run_backtest(config_path: &Path, report_path: Option<&Path>) -> Result<()> {
    let config = RunConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let db_config = DbConfig::from_env().context("datastore configuration")?;
    let source = CandleDb::connect(db_config)
        .await
        .context("connecting to the candle datastore")?;

    let mut strategy = strategies::build(&config.strategy)?;
    let mut backtest = Backtest::new(
        config.engine_config()?,
        config.build_broker()?,
        Arc::new(source),
    );

    let metrics = match config.backtest.mode {
        RunMode::Single => {
            let ticker = config
                .backtest
                .tickers
                .first()
                .context("single mode needs at least one ticker")?
                .clone();
            info!(%ticker, "starting single-symbol backtest");
            backtest.run_on_stock(strategy.as_mut(), &ticker).await?
        }
        RunMode::AllStocks => {
            info!("starting all-symbols backtest");
            backtest.run_on_all_stocks(strategy.as_mut()).await?
        }
    };

    print_metrics(&metrics);

    if let Some(path) = report_path {
        let html = build_report(&metrics, backtest.equity_curve(), backtest.trades());
        std::fs::write(path, html).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }
    Ok(())
}
