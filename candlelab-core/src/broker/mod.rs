//! Broker commission models.
//!
//! A broker is a pure fee policy: `(qty, price, side) -> fee`. Fees are
//! charged to cash separately from order cost or proceeds and never
//! change share counts.

pub mod alpaca;
pub mod ibkr;

pub use alpaca::Alpaca;
pub use ibkr::{Ibkr, IbkrTier};

use crate::domain::TradeSide;

/// Pluggable commission/regulatory-fee policy.
pub trait Broker: Send + Sync {
    /// Total fee for executing `qty` shares at `price` on `side`.
    fn calculate_fees(&self, qty: u64, price: f64, side: TradeSide) -> f64;

    fn name(&self) -> &'static str;
}
