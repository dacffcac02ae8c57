//! Fill — the durable trade record produced by the matching engine.

use super::order::{OrderSide, TradeReason};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Record of an executed order.
///
/// `commission` is the sum of broker, transfer, and channel fees;
/// `taxes` is the stamp tax (sell-only in CN). `net_cash_delta` is the signed
/// cash movement: negative for buys, positive for sells, costs included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub date: NaiveDate,
    pub symbol: String,
    pub side: OrderSide,
    pub shares: u64,
    pub price: f64,
    pub gross_amount: f64,
    pub commission: f64,
    pub taxes: f64,
    pub net_cash_delta: f64,
    pub reason: TradeReason,
}

impl Fill {
    /// Total friction paid on this fill.
    pub fn total_costs(&self) -> f64 {
        self.commission + self.taxes
    }
}
