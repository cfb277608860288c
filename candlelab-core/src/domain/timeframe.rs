//! The four bar durations the engine understands, plus a fixed-size map
//! keyed by them.
//!
//! The datastore keys tables by timeframe strings; inside the engine the
//! closed enum (and `TimeframeMap`) replaces string lookups so the hot
//! loop never compares keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;
use thiserror::Error;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;
pub const DAY_MS: i64 = 86_400_000;

/// Bar duration. The engine drives its tick loop on exactly one of these;
/// the others are sampled on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Timeframe::M1, Timeframe::M5, Timeframe::H1, Timeframe::D1];

    /// Bar duration in milliseconds.
    pub fn granularity_ms(self) -> i64 {
        match self {
            Timeframe::M1 => MINUTE_MS,
            Timeframe::M5 => 5 * MINUTE_MS,
            Timeframe::H1 => HOUR_MS,
            Timeframe::D1 => DAY_MS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::H1 => "1h",
            Timeframe::D1 => "1d",
        }
    }

    /// Datastore table holding this timeframe's candles.
    pub fn table(self) -> &'static str {
        match self {
            Timeframe::M1 => "candles_1m",
            Timeframe::M5 => "candles_5m",
            Timeframe::H1 => "candles_1h",
            Timeframe::D1 => "candles_1d",
        }
    }

    /// Trading periods per calendar year, for annualizing statistics.
    /// 252 sessions, 6.5 regular hours, 78 five-minute bars, 390 minutes.
    pub fn periods_per_year(self) -> f64 {
        match self {
            Timeframe::M1 => 252.0 * 390.0,
            Timeframe::M5 => 252.0 * 78.0,
            Timeframe::H1 => 252.0 * 6.5,
            Timeframe::D1 => 252.0,
        }
    }

    /// Tick-chunk length for the all-symbols loop.
    pub fn chunk_ticks(self) -> usize {
        match self {
            Timeframe::M1 => 2000,
            Timeframe::M5 => 1000,
            Timeframe::H1 => 500,
            Timeframe::D1 => 250,
        }
    }

    /// Forward extent of the sliding preload window for non-main
    /// timeframes in the all-symbols loop.
    pub fn preload_window_ms(self) -> i64 {
        match self {
            Timeframe::M1 => 14 * DAY_MS,
            Timeframe::M5 => 28 * DAY_MS,
            Timeframe::H1 => 120 * DAY_MS,
            Timeframe::D1 => 365 * DAY_MS,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Timeframe::M1 => 0,
            Timeframe::M5 => 1,
            Timeframe::H1 => 2,
            Timeframe::D1 => 3,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown timeframe '{0}' (expected 1m, 5m, 1h, or 1d)")]
pub struct UnknownTimeframe(pub String);

impl FromStr for Timeframe {
    type Err = UnknownTimeframe;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "1h" => Ok(Timeframe::H1),
            "1d" => Ok(Timeframe::D1),
            other => Err(UnknownTimeframe(other.to_string())),
        }
    }
}

/// Dense map from `Timeframe` to `T`, backed by a fixed-size array.
#[derive(Debug, Clone, Default)]
pub struct TimeframeMap<T>([T; 4]);

impl<T> TimeframeMap<T> {
    pub fn iter(&self) -> impl Iterator<Item = (Timeframe, &T)> {
        Timeframe::ALL.iter().zip(self.0.iter()).map(|(&tf, v)| (tf, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Timeframe, &mut T)> {
        Timeframe::ALL
            .iter()
            .zip(self.0.iter_mut())
            .map(|(&tf, v)| (tf, v))
    }
}

impl<T> Index<Timeframe> for TimeframeMap<T> {
    type Output = T;

    fn index(&self, tf: Timeframe) -> &T {
        &self.0[tf.index()]
    }
}

impl<T> IndexMut<Timeframe> for TimeframeMap<T> {
    fn index_mut(&mut self, tf: Timeframe) -> &mut T {
        &mut self.0[tf.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granularities() {
        assert_eq!(Timeframe::M1.granularity_ms(), 60_000);
        assert_eq!(Timeframe::M5.granularity_ms(), 300_000);
        assert_eq!(Timeframe::H1.granularity_ms(), 3_600_000);
        assert_eq!(Timeframe::D1.granularity_ms(), 86_400_000);
    }

    #[test]
    fn parse_round_trips() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
        assert!("2h".parse::<Timeframe>().is_err());
    }

    #[test]
    fn map_indexing() {
        let mut map: TimeframeMap<usize> = TimeframeMap::default();
        map[Timeframe::D1] = 50;
        map[Timeframe::H1] = 24;
        assert_eq!(map[Timeframe::D1], 50);
        assert_eq!(map[Timeframe::M1], 0);
        assert_eq!(map.iter().count(), 4);
    }

    #[test]
    fn annualization_factors() {
        assert_eq!(Timeframe::D1.periods_per_year(), 252.0);
        assert_eq!(Timeframe::H1.periods_per_year(), 252.0 * 6.5);
        assert_eq!(Timeframe::M1.periods_per_year(), 252.0 * 390.0);
    }
}
