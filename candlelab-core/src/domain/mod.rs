//! Domain types shared across the engine: candles, timeframes, execution
//! records, and equity curve points.

pub mod candle;
pub mod equity;
pub mod swap;
pub mod timeframe;
pub mod trade;

pub use candle::Candle;
pub use equity::EquityPoint;
pub use swap::{Swap, TradeSide};
pub use timeframe::{Timeframe, TimeframeMap, UnknownTimeframe};
pub use trade::Trade;
