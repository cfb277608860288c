//! Alpaca fee schedule: zero commission, regulatory fees only.

use crate::broker::Broker;
use crate::domain::TradeSide;

/// FINRA trading activity fee, sells only, capped.
const TAF_PER_SHARE: f64 = 0.000195;
const TAF_SHARE_CAP: u64 = 50_205;
const TAF_FEE_CAP: f64 = 9.79;
/// Consolidated audit trail fee, all executions.
const CAT_PER_SHARE: f64 = 0.0000265;

#[derive(Debug, Clone, Copy, Default)]
pub struct Alpaca {
    slippage: f64,
}

impl Alpaca {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slippage charge as a fraction of notional.
    pub fn with_slippage(mut self, slippage: f64) -> Self {
        self.slippage = slippage;
        self
    }
}

impl Broker for Alpaca {
    fn calculate_fees(&self, qty: u64, price: f64, side: TradeSide) -> f64 {
        let shares = qty as f64;
        let mut fee = 0.0;
        if side == TradeSide::Sell {
            let taf = (qty.min(TAF_SHARE_CAP) as f64 * TAF_PER_SHARE).min(TAF_FEE_CAP);
            fee += round_up_cent(taf);
        }
        fee += shares * CAT_PER_SHARE;
        fee + shares * price * self.slippage
    }

    fn name(&self) -> &'static str {
        "alpaca"
    }
}

fn round_up_cent(amount: f64) -> f64 {
    (amount * 100.0).ceil() / 100.0
}
