use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of an executed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// A single executed buy or sell. Every order the engine accepts is
/// appended here, in execution order; closed round trips are derived from
/// this log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swap {
    pub side: TradeSide,
    pub ticker: String,
    pub qty: u64,
    pub price: f64,
    pub fee: f64,
    pub timestamp: i64,
}
