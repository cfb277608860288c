//! Interactive Brokers commission schedule (US equities).

use crate::broker::Broker;
use crate::domain::TradeSide;

/// Fixed: flat per-share rate. Tiered: lower rate plus exchange and
/// regulatory pass-throughs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IbkrTier {
    Fixed,
    Tiered,
}

const FIXED_PER_SHARE: f64 = 0.005;
const FIXED_MIN: f64 = 1.00;
const TIERED_PER_SHARE: f64 = 0.0035;
const TIERED_MIN: f64 = 0.35;
/// Commission ceiling as a fraction of notional, both tiers.
const MAX_NOTIONAL_FRACTION: f64 = 0.01;

/// FINRA trading activity fee, sells only.
const TAF_PER_SHARE: f64 = 0.000166;
/// Consolidated audit trail fee, sells only.
const CAT_PER_SHARE: f64 = 0.000022;
/// Tiered-only clearing fee.
const CLEARING_PER_SHARE: f64 = 0.0002;
/// Tiered-only pass-throughs, as fractions of the commission.
const NYSE_PASS_THROUGH: f64 = 0.000175;
const FINRA_PASS_THROUGH: f64 = 0.00056;

#[derive(Debug, Clone, Copy)]
pub struct Ibkr {
    tier: IbkrTier,
    slippage: f64,
}

impl Ibkr {
    pub fn new(tier: IbkrTier) -> Self {
        Self {
            tier,
            slippage: 0.0,
        }
    }

    /// Add a slippage charge as a fraction of notional.
    pub fn with_slippage(mut self, slippage: f64) -> Self {
        self.slippage = slippage;
        self
    }
}

impl Broker for Ibkr {
    fn calculate_fees(&self, qty: u64, price: f64, side: TradeSide) -> f64 {
        let shares = qty as f64;
        let notional = shares * price;
        let (per_share, min_fee) = match self.tier {
            IbkrTier::Fixed => (FIXED_PER_SHARE, FIXED_MIN),
            IbkrTier::Tiered => (TIERED_PER_SHARE, TIERED_MIN),
        };
        let commission = (shares * per_share)
            .min(notional * MAX_NOTIONAL_FRACTION)
            .max(min_fee);

        let mut fee = commission;
        if side == TradeSide::Sell {
            fee += shares * TAF_PER_SHARE;
            fee += shares * CAT_PER_SHARE;
        }
        if self.tier == IbkrTier::Tiered {
            fee += shares * CLEARING_PER_SHARE;
            fee += commission * (NYSE_PASS_THROUGH + FINRA_PASS_THROUGH);
        }
        fee + notional * self.slippage
    }

    fn name(&self) -> &'static str {
        match self.tier {
            IbkrTier::Fixed => "ibkr_fixed",
            IbkrTier::Tiered => "ibkr_tiered",
        }
    }
}
