//! Risk manager — pre-trade caps and per-bar forced-exit decisions.
//!
//! The manager holds one piece of mutable state: `peak_equity`, the running
//! maximum of observed equity. It is never reset, even after a full
//! liquidation; a run has one peak for its lifetime.

use crate::domain::{Order, OrderSide, Portfolio, TradeReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// All limits optional; an absent field is not enforced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Single-name cap as a fraction of equity, in (0, 1].
    pub max_position_pct: Option<f64>,
    /// Gross exposure cap as a fraction of equity, in (0, 1].
    pub max_total_exposure: Option<f64>,
    /// Stop-loss trigger below average cost, in (0, 1).
    pub stop_loss_pct: Option<f64>,
    /// Stop-profit trigger above average cost, > 0.
    pub stop_profit_pct: Option<f64>,
    /// Portfolio drawdown trigger from the running peak, in (0, 1).
    pub max_drawdown_pct: Option<f64>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RiskConfigError {
    #[error("{field} = {value} outside {range}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        range: &'static str,
    },
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), RiskConfigError> {
        let check = |field: &'static str,
                     value: Option<f64>,
                     ok: fn(f64) -> bool,
                     range: &'static str| {
            match value {
                Some(v) if !ok(v) => Err(RiskConfigError::OutOfRange { field, value: v, range }),
                _ => Ok(()),
            }
        };
        check("max_position_pct", self.max_position_pct, |v| v > 0.0 && v <= 1.0, "(0, 1]")?;
        check("max_total_exposure", self.max_total_exposure, |v| v > 0.0 && v <= 1.0, "(0, 1]")?;
        check("stop_loss_pct", self.stop_loss_pct, |v| v > 0.0 && v < 1.0, "(0, 1)")?;
        check("stop_profit_pct", self.stop_profit_pct, |v| v > 0.0, "(0, inf)")?;
        check("max_drawdown_pct", self.max_drawdown_pct, |v| v > 0.0 && v < 1.0, "(0, 1)")?;
        Ok(())
    }
}

/// Pre-trade rejection, with a stable wire code.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RiskRejection {
    #[error("position in {symbol} would reach {would_be:.4} of equity (cap {cap})")]
    PositionCap {
        symbol: String,
        would_be: f64,
        cap: f64,
    },

    #[error("gross exposure would reach {would_be:.4} of equity (cap {cap})")]
    ExposureCap { would_be: f64, cap: f64 },
}

impl RiskRejection {
    pub fn code(&self) -> &'static str {
        match self {
            RiskRejection::PositionCap { .. } => "POSITION_CAP",
            RiskRejection::ExposureCap { .. } => "EXPOSURE_CAP",
        }
    }
}

/// Cap comparisons tolerate float noise from proactive sizing right at the
/// cap boundary.
const CAP_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
    peak_equity: f64,
}

impl RiskManager {
    pub fn new(config: RiskConfig, initial_capital: f64) -> Self {
        Self {
            config,
            peak_equity: initial_capital,
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn peak_equity(&self) -> f64 {
        self.peak_equity
    }

    /// Fold an end-of-bar equity sample into the running peak.
    pub fn observe_equity(&mut self, equity: f64) {
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
    }

    /// Pre-trade check. Applies to BUY orders only; the single-name cap is
    /// evaluated before the gross exposure cap and the first failure rejects.
    pub fn check_order_risk(
        &self,
        order: &Order,
        portfolio: &Portfolio,
        prices: &BTreeMap<String, f64>,
    ) -> Result<(), RiskRejection> {
        if order.side != OrderSide::Buy {
            return Ok(());
        }
        let equity = portfolio.equity(prices);
        if equity <= 0.0 {
            return Ok(()); // nothing sensible to cap against
        }
        let addition = order.notional();

        if let Some(cap) = self.config.max_position_pct {
            let current = portfolio
                .get_position(&order.symbol)
                .map(|p| {
                    let price = prices.get(&order.symbol).copied().unwrap_or(p.avg_cost);
                    p.market_value(price)
                })
                .unwrap_or(0.0);
            let would_be = (current + addition) / equity;
            if would_be > cap + CAP_TOLERANCE {
                return Err(RiskRejection::PositionCap {
                    symbol: order.symbol.clone(),
                    would_be,
                    cap,
                });
            }
        }

        if let Some(cap) = self.config.max_total_exposure {
            let would_be = (portfolio.position_value(prices) + addition) / equity;
            if would_be > cap + CAP_TOLERANCE {
                return Err(RiskRejection::ExposureCap { would_be, cap });
            }
        }

        Ok(())
    }

    /// Per-bar exit scan. Updates the running peak, then:
    /// 1. Drawdown protection — clears the whole book and preempts the
    ///    per-symbol checks.
    /// 2. Otherwise, per position in stable symbol order: stop-loss first,
    ///    then stop-profit. Equality triggers on every comparison.
    ///
    /// Returned orders reference the supplied prices; the engine hands them
    /// to matching with the bar-open reference.
    pub fn check_exit_signals(
        &mut self,
        portfolio: &Portfolio,
        prices: &BTreeMap<String, f64>,
    ) -> Vec<Order> {
        let equity = portfolio.equity(prices);
        self.observe_equity(equity);

        if let Some(dd_cap) = self.config.max_drawdown_pct {
            if self.peak_equity > 0.0 {
                let drawdown = (self.peak_equity - equity) / self.peak_equity;
                if drawdown >= dd_cap {
                    return portfolio
                        .positions
                        .values()
                        .filter(|p| p.shares > 0)
                        .map(|p| {
                            let price = prices.get(&p.symbol).copied().unwrap_or(p.avg_cost);
                            Order::forced_exit(
                                &p.symbol,
                                p.shares,
                                price,
                                TradeReason::DrawdownProtection,
                            )
                        })
                        .collect();
                }
            }
        }

        let mut orders = Vec::new();
        for position in portfolio.positions.values().filter(|p| p.shares > 0) {
            let Some(&price) = prices.get(&position.symbol) else {
                continue; // no quote today; nothing to evaluate
            };
            if let Some(sl) = self.config.stop_loss_pct {
                if price <= position.avg_cost * (1.0 - sl) {
                    orders.push(Order::forced_exit(
                        &position.symbol,
                        position.shares,
                        price,
                        TradeReason::StopLoss,
                    ));
                    continue;
                }
            }
            if let Some(sp) = self.config.stop_profit_pct {
                if price >= position.avg_cost * (1.0 + sp) {
                    orders.push(Order::forced_exit(
                        &position.symbol,
                        position.shares,
                        price,
                        TradeReason::StopProfit,
                    ));
                }
            }
        }
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn prices(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|&(s, p)| (s.to_string(), p)).collect()
    }

    fn holding(symbol: &str, shares: u64, avg_cost: f64) -> Portfolio {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_buy(symbol, shares, avg_cost * shares as f64, 0.0, 0.0, day(2));
        portfolio
    }

    #[test]
    fn config_validation_ranges() {
        let ok = RiskConfig {
            max_position_pct: Some(0.3),
            max_total_exposure: Some(0.9),
            stop_loss_pct: Some(0.1),
            stop_profit_pct: Some(0.5),
            max_drawdown_pct: Some(0.2),
        };
        assert!(ok.validate().is_ok());

        let bad = RiskConfig {
            max_position_pct: Some(1.5),
            ..RiskConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = RiskConfig {
            stop_loss_pct: Some(1.0),
            ..RiskConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn buy_within_caps_accepted() {
        let config = RiskConfig {
            max_position_pct: Some(0.3),
            max_total_exposure: Some(0.8),
            ..RiskConfig::default()
        };
        let manager = RiskManager::new(config, 100_000.0);
        let portfolio = Portfolio::new(100_000.0);
        let order = Order::strategy_buy("600000", 2_000, 10.0); // 20%
        assert!(manager
            .check_order_risk(&order, &portfolio, &prices(&[]))
            .is_ok());
    }

    #[test]
    fn position_cap_checked_before_exposure_cap() {
        let config = RiskConfig {
            max_position_pct: Some(0.1),
            max_total_exposure: Some(0.1),
            ..RiskConfig::default()
        };
        let manager = RiskManager::new(config, 100_000.0);
        let portfolio = Portfolio::new(100_000.0);
        let order = Order::strategy_buy("600000", 5_000, 10.0); // 50%, breaks both
        let err = manager
            .check_order_risk(&order, &portfolio, &prices(&[]))
            .unwrap_err();
        assert_eq!(err.code(), "POSITION_CAP");
    }

    #[test]
    fn exposure_cap_counts_other_positions() {
        let config = RiskConfig {
            max_total_exposure: Some(0.5),
            ..RiskConfig::default()
        };
        let manager = RiskManager::new(config, 100_000.0);
        // Holding 40% in one name; buying 20% of another breaks the 50% cap.
        let portfolio = holding("000001", 4_000, 10.0);
        let p = prices(&[("000001", 10.0)]);
        let order = Order::strategy_buy("600000", 2_000, 10.0);
        let err = manager.check_order_risk(&order, &portfolio, &p).unwrap_err();
        assert_eq!(err.code(), "EXPOSURE_CAP");
    }

    #[test]
    fn sells_bypass_pre_trade_checks() {
        let config = RiskConfig {
            max_position_pct: Some(0.01),
            ..RiskConfig::default()
        };
        let manager = RiskManager::new(config, 100_000.0);
        let portfolio = holding("600000", 5_000, 10.0);
        let order = Order::strategy_sell("600000", 5_000, 10.0);
        assert!(manager
            .check_order_risk(&order, &portfolio, &prices(&[("600000", 10.0)]))
            .is_ok());
    }

    #[test]
    fn exact_cap_boundary_accepted() {
        let config = RiskConfig {
            max_position_pct: Some(0.3),
            ..RiskConfig::default()
        };
        let manager = RiskManager::new(config, 100_000.0);
        let portfolio = Portfolio::new(100_000.0);
        // Exactly 30% of equity.
        let order = Order::strategy_buy("600000", 3_000, 10.0);
        assert!(manager
            .check_order_risk(&order, &portfolio, &prices(&[]))
            .is_ok());
    }

    #[test]
    fn stop_loss_triggers_at_boundary() {
        let config = RiskConfig {
            stop_loss_pct: Some(0.10),
            ..RiskConfig::default()
        };
        let mut manager = RiskManager::new(config, 100_000.0);
        let portfolio = holding("600000", 1_000, 10.0);
        // Exactly -10%: equality triggers.
        let orders = manager.check_exit_signals(&portfolio, &prices(&[("600000", 9.0)]));
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].reason, TradeReason::StopLoss);
        assert_eq!(orders[0].shares, 1_000);
    }

    #[test]
    fn stop_profit_triggers() {
        let config = RiskConfig {
            stop_profit_pct: Some(0.5),
            ..RiskConfig::default()
        };
        let mut manager = RiskManager::new(config, 100_000.0);
        let portfolio = holding("600000", 1_000, 10.0);
        let orders = manager.check_exit_signals(&portfolio, &prices(&[("600000", 15.0)]));
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].reason, TradeReason::StopProfit);
    }

    #[test]
    fn stop_loss_wins_over_stop_profit() {
        // Degenerate config where both could fire: losses win ties.
        let config = RiskConfig {
            stop_loss_pct: Some(0.0001),
            stop_profit_pct: Some(0.0001),
            ..RiskConfig::default()
        };
        let mut manager = RiskManager::new(config, 100_000.0);
        let portfolio = holding("600000", 1_000, 10.0);
        let orders = manager.check_exit_signals(&portfolio, &prices(&[("600000", 9.0)]));
        assert_eq!(orders[0].reason, TradeReason::StopLoss);
    }

    #[test]
    fn drawdown_preempts_per_symbol_checks() {
        let config = RiskConfig {
            max_drawdown_pct: Some(0.20),
            stop_profit_pct: Some(0.50),
            ..RiskConfig::default()
        };
        let mut manager = RiskManager::new(config, 100_000.0);
        manager.observe_equity(130_000.0);

        // Position itself is profitable (would hit stop-profit), but the
        // portfolio sits ~31% off its peak.
        let mut portfolio = Portfolio::new(84_000.0);
        portfolio.apply_buy("600000", 1_000, 10_000.0, 0.0, 0.0, day(2));
        let p = prices(&[("600000", 16.0)]); // equity = 74k cash + 16k = 90k
        let orders = manager.check_exit_signals(&portfolio, &p);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].reason, TradeReason::DrawdownProtection);
    }

    #[test]
    fn drawdown_clears_every_position() {
        let config = RiskConfig {
            max_drawdown_pct: Some(0.10),
            ..RiskConfig::default()
        };
        let mut manager = RiskManager::new(config, 100_000.0);
        manager.observe_equity(200_000.0);
        let mut portfolio = Portfolio::new(50_000.0);
        portfolio.apply_buy("000001", 1_000, 10_000.0, 0.0, 0.0, day(2));
        portfolio.apply_buy("600000", 2_000, 20_000.0, 0.0, 0.0, day(2));
        let p = prices(&[("000001", 10.0), ("600000", 10.0)]);
        let orders = manager.check_exit_signals(&portfolio, &p);
        assert_eq!(orders.len(), 2);
        // Stable symbol order.
        assert_eq!(orders[0].symbol, "000001");
        assert_eq!(orders[1].symbol, "600000");
        assert!(orders.iter().all(|o| o.reason == TradeReason::DrawdownProtection));
    }

    #[test]
    fn peak_never_resets() {
        let mut manager = RiskManager::new(RiskConfig::default(), 100_000.0);
        manager.observe_equity(150_000.0);
        manager.observe_equity(90_000.0);
        assert_eq!(manager.peak_equity(), 150_000.0);
    }

    #[test]
    fn no_config_means_no_exits() {
        let mut manager = RiskManager::new(RiskConfig::default(), 100_000.0);
        let portfolio = holding("600000", 1_000, 10.0);
        let orders = manager.check_exit_signals(&portfolio, &prices(&[("600000", 1.0)]));
        assert!(orders.is_empty());
    }

    #[test]
    fn missing_quote_skips_symbol_checks() {
        let config = RiskConfig {
            stop_loss_pct: Some(0.1),
            ..RiskConfig::default()
        };
        let mut manager = RiskManager::new(config, 100_000.0);
        let portfolio = holding("600000", 1_000, 10.0);
        let orders = manager.check_exit_signals(&portfolio, &prices(&[]));
        assert!(orders.is_empty());
    }
}
