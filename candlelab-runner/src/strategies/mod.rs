//! Bundled example strategies and the name-based factory the CLI uses.

pub mod momentum;
pub mod sma_cross;

pub use momentum::MomentumRotation;
pub use sma_cross::SmaCross;

use crate::config::{ConfigError, StrategySection};
use candlelab_core::strategy::Strategy;

/// Build a strategy from its configured type name and parameters.
pub fn build(section: &StrategySection) -> Result<Box<dyn Strategy>, ConfigError> {
    let param = |name: &str, default: f64| -> f64 {
        section.params.get(name).copied().unwrap_or(default)
    };
    match section.strategy_type.as_str() {
        "sma_cross" => {
            let strategy = SmaCross::new(
                param("fast", 25.0) as usize,
                param("slow", 50.0) as usize,
                param("qty", 3.0) as u64,
            )?;
            Ok(Box::new(strategy))
        }
        "momentum_rotation" => {
            let strategy = MomentumRotation::new(
                param("lookback", 90.0) as usize,
                param("hold", 5.0) as usize,
            )?;
            Ok(Box::new(strategy))
        }
        other => Err(ConfigError::UnknownStrategy(other.to_string())),
    }
}
