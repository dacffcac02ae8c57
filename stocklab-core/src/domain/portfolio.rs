//! Portfolio — aggregate state of cash + all open positions.

use super::position::Position;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Aggregate portfolio state.
///
/// Positions live in a `BTreeMap` so every iteration (mark-to-market,
/// forced-exit scans) visits symbols in a stable order; determinism of the
/// whole run depends on it. The equity accounting identity must hold at every
/// bar boundary: `equity == cash + sum(position market values)`.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: BTreeMap<String, Position>,
    pub total_commission: f64,
    pub total_taxes: f64,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            total_commission: 0.0,
            total_taxes: 0.0,
        }
    }

    /// Total equity = cash + sum of all position market values.
    ///
    /// Symbols missing from `prices` are valued at their average cost.
    pub fn equity(&self, prices: &BTreeMap<String, f64>) -> f64 {
        self.cash + self.position_value(prices)
    }

    /// Sum of all position market values.
    pub fn position_value(&self, prices: &BTreeMap<String, f64>) -> f64 {
        self.positions
            .iter()
            .map(|(sym, pos)| {
                let price = prices.get(sym).copied().unwrap_or(pos.avg_cost);
                pos.market_value(price)
            })
            .sum()
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.get(symbol).is_some_and(|p| p.shares > 0)
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol).filter(|p| p.shares > 0)
    }

    /// Apply a buy: debit cash, fold shares into the position.
    pub fn apply_buy(
        &mut self,
        symbol: &str,
        shares: u64,
        cash_out: f64,
        commission: f64,
        taxes: f64,
        date: NaiveDate,
    ) {
        self.cash -= cash_out;
        self.total_commission += commission;
        self.total_taxes += taxes;
        match self.positions.get_mut(symbol) {
            Some(pos) => pos.add_shares(shares, cash_out, date),
            None => {
                let avg_cost = cash_out / shares as f64;
                self.positions
                    .insert(symbol.to_string(), Position::new(symbol, shares, avg_cost, date));
            }
        }
    }

    /// Apply a sell: credit cash, remove shares, drop the position when flat.
    pub fn apply_sell(
        &mut self,
        symbol: &str,
        shares: u64,
        cash_in: f64,
        commission: f64,
        taxes: f64,
    ) {
        self.cash += cash_in;
        self.total_commission += commission;
        self.total_taxes += taxes;
        let flat = match self.positions.get_mut(symbol) {
            Some(pos) => pos.remove_shares(shares) == 0,
            None => false,
        };
        if flat {
            self.positions.remove(symbol);
        }
    }
}
