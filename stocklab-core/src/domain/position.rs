//! Position — per-symbol holding with average cost and acquisition day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A long holding in one symbol.
///
/// `acquired_on` is the latest trading day on which net new shares were added;
/// the T+N sell-eligibility check compares it against the current bar's date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub shares: u64,
    pub avg_cost: f64,
    pub acquired_on: NaiveDate,
}

impl Position {
    pub fn new(symbol: impl Into<String>, shares: u64, avg_cost: f64, acquired_on: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            shares,
            avg_cost,
            acquired_on,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.avg_cost) * self.shares as f64
    }

    /// Fold a buy into the position: average cost recomputed over the combined
    /// share count, acquisition day advanced to the buy day.
    ///
    /// `cost` is the all-in cash outlay (gross + costs) for the added shares.
    pub fn add_shares(&mut self, shares: u64, cost: f64, date: NaiveDate) {
        let total_cost = self.avg_cost * self.shares as f64 + cost;
        self.shares += shares;
        self.avg_cost = total_cost / self.shares as f64;
        self.acquired_on = date;
    }

    /// Remove shares on a sell. Average cost is unchanged (single average-cost
    /// lot accounting). Returns the remaining share count.
    pub fn remove_shares(&mut self, shares: u64) -> u64 {
        self.shares = self.shares.saturating_sub(shares);
        self.shares
    }
}
