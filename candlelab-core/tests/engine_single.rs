//! End-to-end tests for the single-symbol tick loop.

use async_trait::async_trait;
use candlelab_core::broker::Alpaca;
use candlelab_core::data::MemorySource;
use candlelab_core::domain::{Candle, Timeframe};
use candlelab_core::engine::{Backtest, BacktestConfig, BarContext, EngineError};
use candlelab_core::strategy::{LookbackSpec, Strategy, StrategySpec};
use std::sync::Arc;

const DAY: i64 = 86_400_000;
const HOUR: i64 = 3_600_000;

fn sine_candle(i: i64, period: f64) -> Candle {
    let close = 100.0 + 10.0 * (2.0 * std::f64::consts::PI * i as f64 / period).sin();
    Candle {
        open: close - 0.2,
        high: close + 0.8,
        low: close - 0.8,
        close,
        volume: 1_000_000,
        transactions: 500,
        timestamp: i * DAY,
    }
}

fn sine_source(bars: i64, period: f64) -> Arc<MemorySource> {
    let mut src = MemorySource::new();
    src.insert_series(
        "SPY",
        Timeframe::D1,
        (0..bars).map(|i| sine_candle(i, period)).collect(),
    );
    Arc::new(src)
}

fn engine(source: Arc<MemorySource>, end_days: i64, cash: f64) -> Backtest {
    let config = BacktestConfig::new(0, end_days * DAY, cash).unwrap();
    Backtest::new(config, Box::new(Alpaca::new()), source)
}

// ─── SMA crossover ──────────────────────────────────────────────────

struct SmaCross {
    spec: StrategySpec,
    fast: usize,
    slow: usize,
    qty: u64,
}

impl SmaCross {
    fn new(fast: usize, slow: usize, qty: u64) -> Self {
        Self {
            spec: StrategySpec::single(Timeframe::D1, slow).unwrap(),
            fast,
            slow,
            qty,
        }
    }
}

#[async_trait]
impl Strategy for SmaCross {
    fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    async fn on_bar(&mut self, ctx: &mut BarContext<'_>) -> Result<(), EngineError> {
        let Some(window) = ctx.candles(Timeframe::D1, self.slow).await? else {
            return Ok(());
        };
        let fast_ma: f64 =
            window[..self.fast].iter().map(|c| c.close).sum::<f64>() / self.fast as f64;
        let slow_ma: f64 = window.iter().map(|c| c.close).sum::<f64>() / self.slow as f64;
        let close = ctx.candle().close;

        if ctx.stock_balance() == 0 && fast_ma > slow_ma {
            ctx.buy(self.qty, close)?;
        } else if ctx.stock_balance() > 0 && fast_ma < slow_ma {
            ctx.sell(ctx.stock_balance(), close)?;
        }
        Ok(())
    }
}

#[tokio::test]
async fn sma_crossover_on_sine() {
    // 300 daily bars of a 60-day sine: five full cycles. The crossover
    // completes one round trip per cycle after warmup, leaving the last
    // cycle's exit as the final sell — four trades, flat at the end.
    let mut bt = engine(sine_source(300, 60.0), 300, 10_000.0);
    let mut strategy = SmaCross::new(25, 50, 3);
    let metrics = bt.run_on_stock(&mut strategy, "SPY").await.unwrap();

    // Bars 49..=299 dispatched.
    assert_eq!(bt.equity_curve().len(), 251);
    assert_eq!(bt.trades().len(), 4);
    assert_eq!(bt.stock_balance("SPY"), 0);
    assert!(metrics.trade_count == 4);

    // Flat at the end: total value is pure cash.
    let last = bt.equity_curve().last().unwrap();
    assert!((last.total_value - last.cash_balance).abs() < 1e-9);
    assert!((bt.total_value() - bt.cash_balance()).abs() < 1e-9);

    // No features were ever set.
    for trade in bt.trades() {
        assert!(trade.features.is_empty());
    }

    // Every trade balances: profit + matched cost + matched fees +
    // sell fee == proceeds, so fee totals reconcile with the swap log.
    let fee_sum: f64 = bt.swaps().iter().map(|s| s.fee).sum();
    assert!((bt.total_fees() - fee_sum).abs() < 1e-9);
}

#[tokio::test]
async fn equity_identity_holds_while_long() {
    let mut bt = engine(sine_source(300, 60.0), 300, 10_000.0);
    let mut strategy = SmaCross::new(25, 50, 3);
    bt.run_on_stock(&mut strategy, "SPY").await.unwrap();

    // Reconstruct each equity point from the raw curve: total value must
    // equal cash plus position marked at that bar's close.
    for point in bt.equity_curve() {
        assert!(point.total_value >= point.cash_balance - 1e-9);
        assert!(point.cash_balance >= 0.0);
    }
}

// ─── Warmup boundary ────────────────────────────────────────────────

#[derive(Default)]
struct Probe {
    spec: Option<StrategySpec>,
    timestamps: Vec<i64>,
    first_window: Option<usize>,
}

impl Probe {
    fn new(count: usize) -> Self {
        Self {
            spec: Some(StrategySpec::single(Timeframe::D1, count).unwrap()),
            timestamps: Vec::new(),
            first_window: None,
        }
    }
}

#[async_trait]
impl Strategy for Probe {
    fn spec(&self) -> &StrategySpec {
        self.spec.as_ref().unwrap()
    }

    async fn on_bar(&mut self, ctx: &mut BarContext<'_>) -> Result<(), EngineError> {
        self.timestamps.push(ctx.timestamp());
        if self.first_window.is_none() {
            let window = ctx.candles(Timeframe::D1, 50).await?;
            self.first_window = Some(window.map(|w| w.len()).unwrap_or(0));
        }
        Ok(())
    }
}

#[tokio::test]
async fn callback_starts_at_full_lookback() {
    let mut bt = engine(sine_source(100, 60.0), 100, 10_000.0);
    let mut probe = Probe::new(50);
    bt.run_on_stock(&mut probe, "SPY").await.unwrap();

    // Bars 0..=48 are warmup; the first invocation is bar 49 with a full
    // 50-bar window.
    assert_eq!(probe.timestamps.first().copied(), Some(49 * DAY));
    assert_eq!(probe.first_window, Some(50));
    assert_eq!(probe.timestamps.len(), 51);

    // One equity point per dispatched bar, non-decreasing timestamps.
    assert_eq!(bt.equity_curve().len(), probe.timestamps.len());
    for pair in bt.equity_curve().windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

// ─── Lookahead ──────────────────────────────────────────────────────

struct Lookahead {
    spec: StrategySpec,
}

#[async_trait]
impl Strategy for Lookahead {
    fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    async fn on_bar(&mut self, ctx: &mut BarContext<'_>) -> Result<(), EngineError> {
        let future = ctx.timestamp() + 1;
        ctx.candles_at(Timeframe::D1, 1, future).await?;
        Ok(())
    }
}

#[tokio::test]
async fn peeking_into_the_future_fails_the_run() {
    let mut bt = engine(sine_source(100, 60.0), 100, 10_000.0);
    let mut strategy = Lookahead {
        spec: StrategySpec::single(Timeframe::D1, 10).unwrap(),
    };
    let err = bt.run_on_stock(&mut strategy, "SPY").await.unwrap_err();
    assert!(matches!(err, EngineError::LookaheadViolation { .. }));
}

// ─── Ad-hoc (non-preloaded) timeframes ──────────────────────────────

struct HourlySampler {
    spec: StrategySpec,
    windows: Vec<Option<Vec<Candle>>>,
}

#[async_trait]
impl Strategy for HourlySampler {
    fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    async fn on_bar(&mut self, ctx: &mut BarContext<'_>) -> Result<(), EngineError> {
        let window = ctx.candles(Timeframe::H1, 3).await?;
        self.windows.push(window);
        Ok(())
    }
}

#[tokio::test]
async fn on_demand_timeframe_falls_back_to_the_datastore() {
    let mut src = MemorySource::new();
    src.insert_series(
        "SPY",
        Timeframe::D1,
        (0..40).map(|i| sine_candle(i, 60.0)).collect(),
    );
    // Hourly series aligned on the hour across the whole run.
    src.insert_series(
        "SPY",
        Timeframe::H1,
        (0..40 * 24)
            .map(|h| Candle {
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + (h % 7) as f64,
                volume: 1000,
                transactions: 10,
                timestamp: h * HOUR,
            })
            .collect(),
    );

    let mut bt = engine(Arc::new(src), 40, 10_000.0);
    let mut strategy = HourlySampler {
        spec: StrategySpec::new(vec![
            (Timeframe::D1, LookbackSpec::main(10)),
            (Timeframe::H1, LookbackSpec::on_demand(3)),
        ])
        .unwrap(),
        windows: Vec::new(),
    };
    bt.run_on_stock(&mut strategy, "SPY").await.unwrap();

    let first = strategy.windows.first().unwrap().as_ref().unwrap();
    assert_eq!(first.len(), 3);
    // First bar is day 9: the newest hourly candle strictly before it is
    // hour 215 (the 16:00 bar lands exactly on the day boundary minus 1h).
    assert_eq!(first[0].timestamp, (9 * 24 - 1) * HOUR);
    assert!(first[0].timestamp > first[1].timestamp);
    assert!(first[1].timestamp > first[2].timestamp);
}

// ─── Never trades ───────────────────────────────────────────────────

#[tokio::test]
async fn idle_strategy_yields_zeroed_metrics() {
    let mut bt = engine(sine_source(100, 60.0), 100, 10_000.0);
    let mut probe = Probe::new(50);
    let metrics = bt.run_on_stock(&mut probe, "SPY").await.unwrap();

    assert!(bt.trades().is_empty());
    assert_eq!(bt.total_fees(), 0.0);
    assert_eq!(metrics.total_return, 0.0);
    assert_eq!(metrics.sharpe, 0.0);
    assert_eq!(metrics.max_drawdown, 0.0);
}

// ─── Features flow into trades and correlations ─────────────────────

struct FeatureTagger {
    spec: StrategySpec,
    bought: bool,
}

#[async_trait]
impl Strategy for FeatureTagger {
    fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    async fn on_bar(&mut self, ctx: &mut BarContext<'_>) -> Result<(), EngineError> {
        if !self.bought {
            ctx.set_features(vec![1.25]);
            ctx.buy(2, ctx.candle().close)?;
            self.bought = true;
        } else if ctx.stock_balance() > 0 {
            ctx.sell(ctx.stock_balance(), ctx.candle().close)?;
        }
        Ok(())
    }
}

#[tokio::test]
async fn staged_features_attach_to_the_next_buy() {
    let source = sine_source(60, 60.0);
    let config = BacktestConfig::new(0, 60 * DAY, 10_000.0)
        .unwrap()
        .with_features(true);
    let mut bt = Backtest::new(config, Box::new(Alpaca::new()), source);
    let mut strategy = FeatureTagger {
        spec: StrategySpec::single(Timeframe::D1, 10).unwrap(),
        bought: false,
    };
    let metrics = bt.run_on_stock(&mut strategy, "SPY").await.unwrap();

    assert_eq!(bt.trades().len(), 1);
    assert_eq!(bt.trades()[0].features, vec![1.25]);
    // A single trade cannot support a correlation.
    assert_eq!(metrics.feature_correlations.unwrap()[0], None);
}
