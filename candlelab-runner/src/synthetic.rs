//! Deterministic synthetic candle series.
//!
//! Two generators: a pure sine (fully deterministic, used by the engine
//! tests) and a seeded random walk (drift + volatility, for demos and
//! realistic-looking fixtures). Seeding goes through `ChaCha8Rng` so the
//! same seed produces the same series on every platform.

use candlelab_core::domain::{Candle, Timeframe};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Sine around `base` with the given amplitude and period (in bars), one
/// candle per timeframe step starting at `start_ms`.
pub fn sine_series(
    timeframe: Timeframe,
    start_ms: i64,
    bars: usize,
    base: f64,
    amplitude: f64,
    period_bars: f64,
) -> Vec<Candle> {
    let step = timeframe.granularity_ms();
    (0..bars)
        .map(|i| {
            let close =
                base + amplitude * (2.0 * std::f64::consts::PI * i as f64 / period_bars).sin();
            candle(close, start_ms + i as i64 * step)
        })
        .collect()
}

/// Sine candles stamped at explicit timestamps (e.g. session closes).
pub fn sine_at(timestamps: &[i64], base: f64, amplitude: f64, period_bars: f64) -> Vec<Candle> {
    timestamps
        .iter()
        .enumerate()
        .map(|(i, &ts)| {
            let close =
                base + amplitude * (2.0 * std::f64::consts::PI * i as f64 / period_bars).sin();
            candle(close, ts)
        })
        .collect()
}

/// Geometric random walk with per-bar drift and volatility.
pub fn random_walk(
    timeframe: Timeframe,
    start_ms: i64,
    bars: usize,
    start_price: f64,
    drift: f64,
    volatility: f64,
    seed: u64,
) -> Vec<Candle> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let step = timeframe.granularity_ms();
    let mut price = start_price;
    (0..bars)
        .map(|i| {
            let noise: f64 = rng.gen_range(-1.0..1.0);
            price *= 1.0 + drift + volatility * noise;
            price = price.max(0.01);
            candle(price, start_ms + i as i64 * step)
        })
        .collect()
}

fn candle(close: f64, timestamp: i64) -> Candle {
    Candle {
        open: close * 0.998,
        high: close * 1.006,
        low: close * 0.994,
        close,
        volume: 1_000_000,
        transactions: 2_500,
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_is_deterministic_and_bounded() {
        let a = sine_series(Timeframe::D1, 0, 300, 100.0, 10.0, 60.0);
        let b = sine_series(Timeframe::D1, 0, 300, 100.0, 10.0, 60.0);
        assert_eq!(a.len(), 300);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.close.to_bits(), y.close.to_bits());
            assert!(x.close >= 90.0 - 1e-9 && x.close <= 110.0 + 1e-9);
        }
        assert_eq!(a[1].timestamp - a[0].timestamp, 86_400_000);
    }

    #[test]
    fn random_walk_reproduces_per_seed() {
        let a = random_walk(Timeframe::D1, 0, 100, 100.0, 0.0005, 0.01, 42);
        let b = random_walk(Timeframe::D1, 0, 100, 100.0, 0.0005, 0.01, 42);
        let c = random_walk(Timeframe::D1, 0, 100, 100.0, 0.0005, 0.01, 43);
        assert_eq!(a[99].close.to_bits(), b[99].close.to_bits());
        assert_ne!(a[99].close.to_bits(), c[99].close.to_bits());
    }

    #[test]
    fn prices_stay_positive() {
        let series = random_walk(Timeframe::M1, 0, 1000, 1.0, -0.01, 0.05, 7);
        for candle in series {
            assert!(candle.close > 0.0);
            assert!(candle.low > 0.0);
        }
    }

    #[test]
    fn sine_at_uses_given_stamps() {
        let stamps = vec![10, 500, 9_000];
        let series = sine_at(&stamps, 50.0, 5.0, 20.0);
        assert_eq!(series.len(), 3);
        assert_eq!(series[2].timestamp, 9_000);
    }
}
