//! Columnar candle storage.
//!
//! A `Stock` keeps one symbol's candles at one timeframe as a
//! struct-of-arrays: dense primitive columns keep the hot fields (close,
//! timestamp) contiguous for the lookback loop, and a `Candle` is only
//! materialized when a strategy actually reads one.

pub mod column;
pub mod stock;

pub use column::Column;
pub use stock::{Stock, StoreError};
