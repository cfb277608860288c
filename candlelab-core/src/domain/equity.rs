use serde::{Deserialize, Serialize};

/// One sample of the equity curve, appended after every dispatched bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: i64,
    /// Cash plus all positions marked at their last seen close.
    pub total_value: f64,
    pub cash_balance: f64,
}
