//! Order execution and cash/position accounting.
//!
//! Orders mutate state in issue order within a bar. A swap is recorded
//! for every execution; a closing sell additionally records a `Trade`
//! whose P&L is attributed by walking the swap log back to the previous
//! sell on the same ticker.

use crate::domain::{Swap, Trade, TradeSide};
use crate::engine::Backtest;
use thiserror::Error;
use tracing::info;

/// An order the engine rejects. Surfaced to the strategy, never caught by
/// the engine itself.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("insufficient cash: order needs {required:.2} but {available:.2} is available")]
    InsufficientCash { required: f64, available: f64 },

    #[error("insufficient shares of {ticker}: selling {requested} but holding {held}")]
    InsufficientShares {
        ticker: String,
        requested: u64,
        held: u64,
    },

    #[error("invalid order: qty {qty} at price {price}")]
    InvalidOrder { qty: u64, price: f64 },
}

impl Backtest {
    /// Execute a buy: cash is debited cost plus fee, the position grows,
    /// and a staged feature vector (if any, non-empty) sticks to the
    /// position until it is fully closed.
    pub fn buy(
        &mut self,
        ticker: &str,
        qty: u64,
        price: f64,
        timestamp: i64,
        features: Option<Vec<f64>>,
    ) -> Result<(), OrderError> {
        if qty == 0 || !(price > 0.0) {
            return Err(OrderError::InvalidOrder { qty, price });
        }
        let cost = qty as f64 * price;
        let fee = self.broker.calculate_fees(qty, price, TradeSide::Buy);
        if cost + fee > self.cash_balance {
            return Err(OrderError::InsufficientCash {
                required: cost + fee,
                available: self.cash_balance,
            });
        }

        self.cash_balance -= cost + fee;
        *self.stock_balances.entry(ticker.to_string()).or_insert(0) += qty;
        self.total_fees += fee;
        self.swaps.push(Swap {
            side: TradeSide::Buy,
            ticker: ticker.to_string(),
            qty,
            price,
            fee,
            timestamp,
        });
        self.stock_prices.insert(ticker.to_string(), price);
        self.hold_since.insert(ticker.to_string(), timestamp);
        if let Some(features) = features {
            if !features.is_empty() {
                self.stock_features.insert(ticker.to_string(), features);
            }
        }

        if self.config.logs {
            info!(ticker, qty, price, fee, "buy");
        }
        self.debug_check_invariants();
        Ok(())
    }

    /// Execute a sell: cash is credited proceeds minus fee, and a `Trade`
    /// is recorded with P&L attributed to the buys since the last sell on
    /// this ticker.
    pub fn sell(
        &mut self,
        ticker: &str,
        qty: u64,
        price: f64,
        timestamp: i64,
    ) -> Result<(), OrderError> {
        if qty == 0 || !(price > 0.0) {
            return Err(OrderError::InvalidOrder { qty, price });
        }
        let held = self.stock_balance(ticker);
        if held < qty {
            return Err(OrderError::InsufficientShares {
                ticker: ticker.to_string(),
                requested: qty,
                held,
            });
        }

        let proceeds = qty as f64 * price;
        let fee = self.broker.calculate_fees(qty, price, TradeSide::Sell);
        self.cash_balance += proceeds - fee;
        self.total_fees += fee;

        let (matched_cost, matched_fees) = self.matched_buys(ticker);
        let profit = proceeds - matched_cost - matched_fees - fee;
        let profit_percent = if matched_cost > 0.0 {
            profit / matched_cost
        } else {
            0.0
        };
        self.trades.push(Trade {
            ticker: ticker.to_string(),
            qty,
            price,
            timestamp,
            fee,
            profit,
            profit_percent,
            features: self.stock_features.get(ticker).cloned().unwrap_or_default(),
        });

        // Recorded after the trade so the attribution walk above never
        // sees this sell.
        self.swaps.push(Swap {
            side: TradeSide::Sell,
            ticker: ticker.to_string(),
            qty,
            price,
            fee,
            timestamp,
        });

        let remaining = held - qty;
        if remaining == 0 {
            self.stock_balances.remove(ticker);
            self.hold_since.remove(ticker);
            self.stock_features.remove(ticker);
        } else {
            self.stock_balances.insert(ticker.to_string(), remaining);
        }

        if self.config.logs {
            info!(ticker, qty, price, fee, profit, "sell");
        }
        self.debug_check_invariants();
        Ok(())
    }

    /// Cash plus every position marked at its last seen close.
    pub fn total_value(&self) -> f64 {
        let positions: f64 = self
            .stock_balances
            .iter()
            .map(|(ticker, &qty)| {
                qty as f64 * self.stock_prices.get(ticker).copied().unwrap_or(0.0)
            })
            .sum();
        self.cash_balance + positions
    }

    /// Sum cost and fees of this ticker's buys since its previous sell
    /// (or the start of the log).
    fn matched_buys(&self, ticker: &str) -> (f64, f64) {
        let mut cost = 0.0;
        let mut fees = 0.0;
        for swap in self.swaps.iter().rev() {
            if swap.ticker != ticker {
                continue;
            }
            match swap.side {
                TradeSide::Sell => break,
                TradeSide::Buy => {
                    cost += swap.qty as f64 * swap.price;
                    fees += swap.fee;
                }
            }
        }
        (cost, fees)
    }

    fn debug_check_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            assert!(
                self.cash_balance >= -1e-9,
                "cash balance went negative: {}",
                self.cash_balance
            );
            for (ticker, &qty) in &self.stock_balances {
                assert!(qty > 0, "zero-balance entry left in map for {ticker}");
            }
            let fee_sum: f64 = self.swaps.iter().map(|s| s.fee).sum();
            assert!(
                (fee_sum - self.total_fees).abs() < 1e-9,
                "fee accumulator {} diverged from swap log {}",
                self.total_fees,
                fee_sum
            );
        }
    }
}
