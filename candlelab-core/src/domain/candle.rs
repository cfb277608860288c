use serde::{Deserialize, Serialize};

/// Single OHLCV candle with an epoch-millisecond UTC timestamp.
///
/// Candles are immutable once constructed. The usual price invariants
/// (`low <= open, close <= high`) are trusted from the datastore and not
/// re-checked on the read path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Trade count for the interval; zero when the source lacks it.
    pub transactions: u64,
    /// Milliseconds since the Unix epoch, UTC.
    pub timestamp: i64,
}

impl Candle {
    /// Check if the candle closed above its open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// High-to-low range.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(close: f64, ts: i64) -> Candle {
        Candle {
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
            transactions: 10,
            timestamp: ts,
        }
    }

    #[test]
    fn bullish_when_close_above_open() {
        assert!(candle(100.0, 0).is_bullish());
        let mut c = candle(100.0, 0);
        c.open = 101.0;
        assert!(!c.is_bullish());
    }

    #[test]
    fn range_is_high_minus_low() {
        assert!((candle(100.0, 0).range() - 2.0).abs() < 1e-12);
    }
}
