//! Strategy configuration and the per-bar callback trait.
//!
//! A strategy declares, per timeframe, how many past bars it needs and
//! whether those bars should be streamed ahead of the simulation clock.
//! Exactly one timeframe is the **main** one: it drives the tick loop,
//! and it is always preloaded.

use crate::domain::{Timeframe, TimeframeMap};
use crate::engine::context::{BarContext, UniverseContext};
use crate::engine::EngineError;
use async_trait::async_trait;
use thiserror::Error;

/// Invalid strategy or engine construction. Fatal before the run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("strategy declares no main timeframe")]
    NoMainTimeframe,

    #[error("strategy declares more than one main timeframe")]
    MultipleMainTimeframes,

    #[error("timeframe {0} appears twice in the strategy spec")]
    DuplicateTimeframe(Timeframe),

    #[error("lookback count for {0} must be at least 1")]
    ZeroLookback(Timeframe),

    #[error("end date {end} must be after start date {start}")]
    InvalidDateRange { start: i64, end: i64 },

    #[error("starting cash must be positive, got {0}")]
    NonPositiveCash(f64),
}

/// Lookback requirements for one timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackSpec {
    /// Number of past bars the strategy reads at this timeframe.
    pub count: usize,
    /// Whether this timeframe drives the tick loop.
    pub main: bool,
    /// Whether bars are streamed ahead of the clock instead of fetched
    /// per request. Always true for the main timeframe.
    pub preload: bool,
}

impl LookbackSpec {
    pub fn main(count: usize) -> Self {
        Self {
            count,
            main: true,
            preload: true,
        }
    }

    pub fn preloaded(count: usize) -> Self {
        Self {
            count,
            main: false,
            preload: true,
        }
    }

    pub fn on_demand(count: usize) -> Self {
        Self {
            count,
            main: false,
            preload: false,
        }
    }
}

/// Immutable, validated per-timeframe lookback configuration.
#[derive(Debug, Clone)]
pub struct StrategySpec {
    frames: TimeframeMap<Option<LookbackSpec>>,
    main: Timeframe,
}

impl StrategySpec {
    /// Validate and build. Exactly one main timeframe, every count at
    /// least 1, no duplicates; the main timeframe is forced to preload.
    pub fn new(frames: Vec<(Timeframe, LookbackSpec)>) -> Result<Self, ConfigError> {
        let mut map: TimeframeMap<Option<LookbackSpec>> = TimeframeMap::default();
        let mut main: Option<Timeframe> = None;
        for (tf, mut frame) in frames {
            if map[tf].is_some() {
                return Err(ConfigError::DuplicateTimeframe(tf));
            }
            if frame.count == 0 {
                return Err(ConfigError::ZeroLookback(tf));
            }
            if frame.main {
                if main.is_some() {
                    return Err(ConfigError::MultipleMainTimeframes);
                }
                main = Some(tf);
                frame.preload = true;
            }
            map[tf] = Some(frame);
        }
        let main = main.ok_or(ConfigError::NoMainTimeframe)?;
        Ok(Self { frames: map, main })
    }

    /// Single-timeframe convenience: `timeframe` is main with `count`.
    pub fn single(timeframe: Timeframe, count: usize) -> Result<Self, ConfigError> {
        Self::new(vec![(timeframe, LookbackSpec::main(count))])
    }

    pub fn main_timeframe(&self) -> Timeframe {
        self.main
    }

    /// Lookback count of the main timeframe.
    pub fn main_lookback(&self) -> usize {
        // Validated at construction: the main frame exists.
        self.frames[self.main].map(|f| f.count).unwrap_or(1)
    }

    pub fn frame(&self, timeframe: Timeframe) -> Option<&LookbackSpec> {
        self.frames[timeframe].as_ref()
    }

    /// Iterate declared timeframes and their lookback specs.
    pub fn frames(&self) -> impl Iterator<Item = (Timeframe, &LookbackSpec)> {
        self.frames
            .iter()
            .filter_map(|(tf, frame)| frame.as_ref().map(|f| (tf, f)))
    }
}

/// The user decision procedure, invoked once per dispatched bar.
///
/// Implement `on_bar` for single-symbol runs, `on_universe` for
/// all-symbols runs, or both. The defaults do nothing, so a strategy only
/// has to implement the mode it supports. Errors abort the run; the
/// engine does not catch them.
#[async_trait]
pub trait Strategy: Send {
    fn spec(&self) -> &StrategySpec;

    async fn on_bar(&mut self, ctx: &mut BarContext<'_>) -> Result<(), EngineError> {
        let _ = ctx;
        Ok(())
    }

    async fn on_universe(&mut self, ctx: &mut UniverseContext<'_>) -> Result<(), EngineError> {
        let _ = ctx;
        Ok(())
    }
}
