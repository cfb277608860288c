//! CandleLab core engine.
//!
//! Provides the columnar candle store, streaming candle buffer, datastore
//! client, broker fee policies, the bar-by-bar tick loops, and metrics.

pub mod broker;
pub mod data;
pub mod domain;
pub mod engine;
pub mod metrics;
pub mod store;
pub mod strategy;
