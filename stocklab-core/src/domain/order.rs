//! Orders — ephemeral trade intentions, and the reasons behind them.

use serde::{Deserialize, Serialize};

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Who asked for the trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderOrigin {
    /// Emitted by a strategy signal.
    Strategy,
    /// Emitted by the risk manager.
    ForcedExit,
}

/// Why a fill (or a forced-exit order) happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeReason {
    Strategy,
    StopLoss,
    StopProfit,
    DrawdownProtection,
}

impl TradeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeReason::Strategy => "STRATEGY",
            TradeReason::StopLoss => "STOP_LOSS",
            TradeReason::StopProfit => "STOP_PROFIT",
            TradeReason::DrawdownProtection => "DRAWDOWN_PROTECTION",
        }
    }
}

/// A pending trade intention. Orders are ephemeral: they exist between signal
/// consumption and matching, and are never stored after the matching engine
/// has produced a fill or a rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub side: OrderSide,
    pub shares: u64,
    /// The price the order is referenced against (open for forced exits,
    /// close for strategy signals). Slippage is applied on top at matching.
    pub reference_price: f64,
    pub origin: OrderOrigin,
    pub reason: TradeReason,
}

impl Order {
    pub fn strategy_buy(symbol: impl Into<String>, shares: u64, reference_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side: OrderSide::Buy,
            shares,
            reference_price,
            origin: OrderOrigin::Strategy,
            reason: TradeReason::Strategy,
        }
    }

    pub fn strategy_sell(symbol: impl Into<String>, shares: u64, reference_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side: OrderSide::Sell,
            shares,
            reference_price,
            origin: OrderOrigin::Strategy,
            reason: TradeReason::Strategy,
        }
    }

    pub fn forced_exit(
        symbol: impl Into<String>,
        shares: u64,
        reference_price: f64,
        reason: TradeReason,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side: OrderSide::Sell,
            shares,
            reference_price,
            origin: OrderOrigin::ForcedExit,
            reason,
        }
    }

    pub fn notional(&self) -> f64 {
        self.shares as f64 * self.reference_price
    }
}
