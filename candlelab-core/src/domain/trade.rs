use serde::{Deserialize, Serialize};

/// Closed round trip, recorded on the closing sell.
///
/// `profit` nets out the matched buy cost, the matched buy fees, and the
/// closing sell's own fee; `profit_percent` is profit over matched cost
/// (zero when the cost base is zero).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub ticker: String,
    pub qty: u64,
    pub price: f64,
    pub timestamp: i64,
    pub fee: f64,
    pub profit: f64,
    pub profit_percent: f64,
    /// Feature vector attached at buy time; empty when none was set.
    #[serde(default)]
    pub features: Vec<f64>,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.profit > 0.0
    }
}
