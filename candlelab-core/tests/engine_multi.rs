//! End-to-end tests for the all-symbols tick loop: delisting, weekend
//! skipping, and the New York close normalization of daily ticks.

use async_trait::async_trait;
use candlelab_core::broker::Alpaca;
use candlelab_core::data::MemorySource;
use candlelab_core::domain::{Candle, Timeframe};
use candlelab_core::engine::{clock, Backtest, BacktestConfig, EngineError, UniverseContext};
use candlelab_core::strategy::{Strategy, StrategySpec};
use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;

fn ms(date: (i32, u32, u32)) -> i64 {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
        .unwrap()
        .and_time(NaiveTime::MIN)
        .and_utc()
        .timestamp_millis()
}

/// New York close timestamps for every weekday in the run window.
fn session_stamps(start_ms: i64, end_ms: i64) -> Vec<i64> {
    clock::ticks(Timeframe::D1, start_ms, end_ms)
        .into_iter()
        .filter(|&t| !clock::is_weekend(t))
        .collect()
}

fn candles_at(stamps: &[i64], base: f64) -> Vec<Candle> {
    stamps
        .iter()
        .enumerate()
        .map(|(i, &ts)| {
            let close = base + i as f64 * 0.5;
            Candle {
                open: close - 0.2,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 10_000,
                transactions: 100,
                timestamp: ts,
            }
        })
        .collect()
}

/// Buys one share of a target symbol the first time it shows up, then
/// holds forever.
struct BuyOnceAndHold {
    spec: StrategySpec,
    target: String,
    bought: bool,
}

impl BuyOnceAndHold {
    fn new(target: &str) -> Self {
        Self {
            spec: StrategySpec::single(Timeframe::D1, 1).unwrap(),
            target: target.to_string(),
            bought: false,
        }
    }
}

#[async_trait]
impl Strategy for BuyOnceAndHold {
    fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    async fn on_universe(&mut self, ctx: &mut UniverseContext<'_>) -> Result<(), EngineError> {
        if self.bought {
            return Ok(());
        }
        if let Some(entry) = ctx.entries().iter().find(|e| e.ticker == self.target) {
            ctx.buy(&self.target, 1, entry.candle.close)?;
            self.bought = true;
        }
        Ok(())
    }
}

fn universe(
    a_sessions: &[i64],
    b_sessions: &[i64],
) -> Arc<MemorySource> {
    let mut src = MemorySource::new();
    src.insert_series("AAA", Timeframe::D1, candles_at(a_sessions, 50.0));
    src.insert_series("BBB", Timeframe::D1, candles_at(b_sessions, 20.0));
    Arc::new(src)
}

#[tokio::test]
async fn delisted_symbol_is_silently_zeroed() {
    let start = ms((2024, 1, 1));
    let end = ms((2024, 3, 1));
    let stamps = session_stamps(start, end);
    assert!(stamps.len() > 32);

    // BBB disappears after 20 sessions; AAA runs the whole window.
    let src = universe(&stamps, &stamps[..20]);
    let config = BacktestConfig::new(start, end, 1_000.0).unwrap();
    let mut bt = Backtest::new(config, Box::new(Alpaca::new()), src);
    let mut strategy = BuyOnceAndHold::new("BBB");
    bt.run_on_all_stocks(&mut strategy).await.unwrap();

    // The position vanished without a sell and without proceeds.
    assert_eq!(bt.stock_balance("BBB"), 0);
    assert!(!bt.stock_balances().contains_key("BBB"));
    assert!(bt.trades().is_empty());
    assert_eq!(bt.swaps().len(), 1);

    let buy = &bt.swaps()[0];
    let expected_cash = 1_000.0 - buy.qty as f64 * buy.price - buy.fee;
    assert!((bt.cash_balance() - expected_cash).abs() < 1e-9);
    assert!(bt.hold_since("BBB").is_none());
}

#[tokio::test]
async fn ten_consecutive_absences_keep_the_position() {
    let start = ms((2024, 1, 1));
    let stamps_all = session_stamps(start, ms((2024, 3, 1)));
    // Exactly 30 sessions: 20 with BBB present, then 10 absences.
    let stamps = &stamps_all[..30];
    let end = stamps[29] + 1;

    let src = universe(stamps, &stamps[..20]);
    let config = BacktestConfig::new(start, end, 1_000.0).unwrap();
    let mut bt = Backtest::new(config, Box::new(Alpaca::new()), src);
    let mut strategy = BuyOnceAndHold::new("BBB");
    bt.run_on_all_stocks(&mut strategy).await.unwrap();

    // Ten misses is within tolerance; the eleventh would zero it.
    assert_eq!(bt.stock_balance("BBB"), 1);
}

#[tokio::test]
async fn weekend_ticks_are_never_dispatched() {
    let start = ms((2024, 1, 1));
    let end = ms((2024, 2, 1));
    let stamps = session_stamps(start, end);

    let src = universe(&stamps, &stamps);
    let config = BacktestConfig::new(start, end, 1_000.0).unwrap();
    let mut bt = Backtest::new(config, Box::new(Alpaca::new()), src);
    let mut strategy = BuyOnceAndHold::new("AAA");
    bt.run_on_all_stocks(&mut strategy).await.unwrap();

    assert!(!bt.equity_curve().is_empty());
    for point in bt.equity_curve() {
        assert!(!clock::is_weekend(point.timestamp));
    }
    // One equity point per session with data.
    assert_eq!(bt.equity_curve().len(), stamps.len());
}

#[tokio::test]
async fn daily_ticks_are_new_york_close() {
    let start = ms((2024, 1, 1));
    let end = ms((2024, 1, 20));
    let stamps = session_stamps(start, end);

    let src = universe(&stamps, &stamps);
    let config = BacktestConfig::new(start, end, 1_000.0).unwrap();
    let mut bt = Backtest::new(config, Box::new(Alpaca::new()), src);
    let mut strategy = BuyOnceAndHold::new("AAA");
    bt.run_on_all_stocks(&mut strategy).await.unwrap();

    for point in bt.equity_curve() {
        let date = chrono::DateTime::from_timestamp_millis(point.timestamp)
            .unwrap()
            .date_naive();
        assert_eq!(point.timestamp, clock::ny_close_ms(date));
    }
}

// ─── Universe candle windows ────────────────────────────────────────

struct WindowProbe {
    spec: StrategySpec,
    windows: Vec<Option<Vec<Candle>>>,
}

#[async_trait]
impl Strategy for WindowProbe {
    fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    async fn on_universe(&mut self, ctx: &mut UniverseContext<'_>) -> Result<(), EngineError> {
        let window = ctx.candles("AAA", Timeframe::D1, 5, None).await?;
        self.windows.push(window);
        Ok(())
    }
}

#[tokio::test]
async fn universe_windows_read_from_the_chunk_stores() {
    let start = ms((2024, 1, 1));
    let end = ms((2024, 2, 1));
    let stamps = session_stamps(start, end);

    let src = universe(&stamps, &stamps);
    let config = BacktestConfig::new(start, end, 1_000.0).unwrap();
    let mut bt = Backtest::new(config, Box::new(Alpaca::new()), src);
    let mut probe = WindowProbe {
        spec: StrategySpec::single(Timeframe::D1, 1).unwrap(),
        windows: Vec::new(),
    };
    bt.run_on_all_stocks(&mut probe).await.unwrap();

    // Early ticks lack five bars of history.
    assert!(probe.windows[0].is_none());
    // From the fifth session on, windows resolve, newest first.
    let window = probe.windows[6].as_ref().unwrap();
    assert_eq!(window.len(), 5);
    assert_eq!(window[0].timestamp, stamps[6]);
    assert_eq!(window[4].timestamp, stamps[2]);
}

#[tokio::test]
async fn universe_lookahead_is_fatal() {
    struct Peek {
        spec: StrategySpec,
    }

    #[async_trait]
    impl Strategy for Peek {
        fn spec(&self) -> &StrategySpec {
            &self.spec
        }

        async fn on_universe(&mut self, ctx: &mut UniverseContext<'_>) -> Result<(), EngineError> {
            ctx.candles("AAA", Timeframe::D1, 1, Some(ctx.timestamp() + 1)).await?;
            Ok(())
        }
    }

    let start = ms((2024, 1, 1));
    let end = ms((2024, 1, 20));
    let stamps = session_stamps(start, end);
    let src = universe(&stamps, &stamps);
    let config = BacktestConfig::new(start, end, 1_000.0).unwrap();
    let mut bt = Backtest::new(config, Box::new(Alpaca::new()), src);
    let mut strategy = Peek {
        spec: StrategySpec::single(Timeframe::D1, 1).unwrap(),
    };
    let err = bt.run_on_all_stocks(&mut strategy).await.unwrap_err();
    assert!(matches!(err, EngineError::LookaheadViolation { .. }));
}
