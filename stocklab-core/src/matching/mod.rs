//! Matching engine — turn an accepted order into at most one fill.
//!
//! Inputs: the order, the current bar, and the governing ruleset. The engine
//! applies suspension/volume checks, price limits with a limit-locked test,
//! symmetric slippage, lot rounding, commission, and buy-side cash clipping.
//! Outcomes are tagged values; nothing here is fatal to a run.

use crate::domain::{Bar, Fill, Order, OrderSide};
use crate::venue::{round_money, PriceLimits, Ruleset};
use serde::Serialize;

/// Default slippage applied to execution prices, in basis points.
pub const DEFAULT_SLIPPAGE_BPS: f64 = 5.0;

/// Relative tolerance for the limit-locked test: a bar closing within this
/// fraction of the limit price counts as pinned at the limit.
pub const LIMIT_LOCK_EPSILON: f64 = 1e-3;

/// Why no fill was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoFillReason {
    Suspended,
    LimitUp,
    LimitDown,
    LotTooSmall,
    InsufficientCash,
}

impl NoFillReason {
    pub fn code(&self) -> &'static str {
        match self {
            NoFillReason::Suspended => "SUSPENDED",
            NoFillReason::LimitUp => "LIMIT_UP",
            NoFillReason::LimitDown => "LIMIT_DOWN",
            NoFillReason::LotTooSmall => "LOT_TOO_SMALL",
            NoFillReason::InsufficientCash => "INSUFFICIENT_CASH",
        }
    }
}

/// Result of one matching attempt.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Filled(Fill),
    NoFill(NoFillReason),
}

impl MatchOutcome {
    pub fn fill(self) -> Option<Fill> {
        match self {
            MatchOutcome::Filled(fill) => Some(fill),
            MatchOutcome::NoFill(_) => None,
        }
    }
}

/// Per-order matching context supplied by the trading engine.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub ruleset: &'a Ruleset,
    pub slippage_bps: f64,
    /// First bar of the series: no usable prev_close, price-limit checks off.
    pub first_bar: bool,
    /// Days since listing, for the IPO limit exception. None = unknown.
    pub ipo_age_days: Option<i64>,
    /// Cash available for buys; sells ignore it.
    pub available_cash: f64,
}

/// Match one order against one bar.
pub fn match_order(order: &Order, bar: &Bar, ctx: &MatchContext) -> MatchOutcome {
    // 1. Nothing trades on a suspended or zero-volume day.
    if bar.is_untradable() {
        return MatchOutcome::NoFill(NoFillReason::Suspended);
    }

    // 2. Price limits. The first bar has no prev_close to reference.
    let limits = if ctx.first_bar {
        PriceLimits::NONE
    } else {
        ctx.ruleset.price_limits(bar.prev_close, ctx.ipo_age_days)
    };

    // 3. Execution price: reference adjusted by symmetric slippage.
    let dp = ctx.ruleset.money_decimals();
    let slip = ctx.slippage_bps / 10_000.0;
    let execution_price = round_money(
        match order.side {
            OrderSide::Buy => order.reference_price * (1.0 + slip),
            OrderSide::Sell => order.reference_price * (1.0 - slip),
        },
        dp,
    );

    // 4. Limit-locked test: an order priced at or through the limit only
    //    fails when the bar also closed pinned at the limit price. A close
    //    outside the band entirely cannot occur on a limit-governed venue;
    //    such bars are treated as tradable rather than locked.
    if order.side == OrderSide::Buy {
        if let Some(upper) = limits.upper {
            if execution_price >= upper && bar.close >= upper * (1.0 - LIMIT_LOCK_EPSILON) {
                return MatchOutcome::NoFill(NoFillReason::LimitUp);
            }
        }
    } else if let Some(lower) = limits.lower {
        let pinned = bar.close >= lower * (1.0 - LIMIT_LOCK_EPSILON)
            && bar.close <= lower * (1.0 + LIMIT_LOCK_EPSILON);
        if execution_price <= lower && pinned {
            return MatchOutcome::NoFill(NoFillReason::LimitDown);
        }
    }

    // 5. Lot rounding. Sells may close odd lots (a full position is always
    //    sellable); buys must land on a lot multiple.
    let lot = ctx.ruleset.lot_size();
    let mut shares = match order.side {
        OrderSide::Buy => (order.shares / lot) * lot,
        OrderSide::Sell => order.shares,
    };
    if shares == 0 {
        return MatchOutcome::NoFill(NoFillReason::LotTooSmall);
    }

    // 6–7. Commission, and cash feasibility for buys: clip to the largest
    //      affordable lot multiple.
    let (gross, commission) = loop {
        let gross = round_money(shares as f64 * execution_price, dp);
        let commission = ctx.ruleset.commission(order.side, gross, &order.symbol);
        if order.side == OrderSide::Sell {
            break (gross, commission);
        }
        if gross + commission.total <= ctx.available_cash + 1e-9 {
            break (gross, commission);
        }
        // Jump straight under the cash line, then step down lot by lot for
        // the commission floor.
        let affordable_lots = (ctx.available_cash / (execution_price * lot as f64)).floor() as u64;
        let current_lots = shares / lot;
        let next_lots = affordable_lots.min(current_lots.saturating_sub(1));
        if next_lots == 0 {
            return MatchOutcome::NoFill(NoFillReason::InsufficientCash);
        }
        shares = next_lots * lot;
    };

    // 8. Signed cash movement, costs included.
    let costs = commission.total;
    let net_cash_delta = match order.side {
        OrderSide::Buy => -(gross + costs),
        OrderSide::Sell => gross - costs,
    };

    MatchOutcome::Filled(Fill {
        date: bar.date,
        symbol: order.symbol.clone(),
        side: order.side,
        shares,
        price: execution_price,
        gross_amount: gross,
        commission: round_money(commission.broker + commission.transfer_fee + commission.channel_fee, dp),
        taxes: commission.stamp_tax,
        net_cash_delta: round_money(net_cash_delta, dp),
        reason: order.reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TradeReason;
    use crate::venue::{Board, Channel, Market, RulesRegistry, TradingEnvironment};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn cn_main() -> Arc<Ruleset> {
        RulesRegistry::builtin()
            .unwrap()
            .ruleset(TradingEnvironment::new(Market::Cn, Board::Main, Channel::Direct))
            .unwrap()
    }

    fn bar(open: f64, close: f64, prev_close: f64) -> Bar {
        Bar {
            symbol: "600000".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 1_000_000,
            prev_close,
            suspended: false,
        }
    }

    fn ctx<'a>(ruleset: &'a Ruleset, cash: f64) -> MatchContext<'a> {
        MatchContext {
            ruleset,
            slippage_bps: 0.0,
            first_bar: false,
            ipo_age_days: Some(1000),
            available_cash: cash,
        }
    }

    #[test]
    fn plain_buy_fills_at_reference() {
        let rules = cn_main();
        let order = Order::strategy_buy("600000", 1000, 10.0);
        let outcome = match_order(&order, &bar(10.0, 10.0, 10.0), &ctx(&rules, 100_000.0));
        let fill = outcome.fill().expect("should fill");
        assert_eq!(fill.shares, 1000);
        assert_eq!(fill.price, 10.0);
        assert_eq!(fill.gross_amount, 10_000.0);
        // broker floored at 5, transfer 0.1 on SH
        assert_eq!(fill.commission, 5.1);
        assert_eq!(fill.taxes, 0.0);
        assert_eq!(fill.net_cash_delta, -10_005.1);
    }

    #[test]
    fn sell_credits_net_of_costs() {
        let rules = cn_main();
        let order = Order::strategy_sell("600000", 1000, 11.0);
        let fill = match_order(&order, &bar(11.0, 11.0, 10.5), &ctx(&rules, 0.0))
            .fill()
            .expect("should fill");
        assert_eq!(fill.gross_amount, 11_000.0);
        // stamp: 11_000 * 0.0005 = 5.5
        assert_eq!(fill.taxes, 5.5);
        assert!(fill.net_cash_delta > 0.0);
        assert!((fill.net_cash_delta - (11_000.0 - fill.commission - fill.taxes)).abs() < 1e-9);
    }

    #[test]
    fn slippage_is_symmetric() {
        let rules = cn_main();
        let ctx = MatchContext {
            slippage_bps: 10.0,
            ..ctx(&rules, 1_000_000.0)
        };
        let buy = match_order(
            &Order::strategy_buy("600000", 1000, 10.0),
            &bar(10.0, 10.0, 10.0),
            &ctx,
        )
        .fill()
        .unwrap();
        assert_eq!(buy.price, 10.01);

        let sell = match_order(
            &Order::strategy_sell("600000", 1000, 10.0),
            &bar(10.0, 10.0, 10.0),
            &ctx,
        )
        .fill()
        .unwrap();
        assert_eq!(sell.price, 9.99);
    }

    #[test]
    fn suspended_bar_never_fills() {
        let rules = cn_main();
        let mut b = bar(10.0, 10.0, 10.0);
        b.suspended = true;
        let outcome = match_order(
            &Order::strategy_buy("600000", 1000, 10.0),
            &b,
            &ctx(&rules, 100_000.0),
        );
        assert!(matches!(outcome, MatchOutcome::NoFill(NoFillReason::Suspended)));
    }

    #[test]
    fn zero_volume_day_never_fills() {
        let rules = cn_main();
        let mut b = bar(10.0, 10.0, 10.0);
        b.volume = 0;
        let outcome = match_order(
            &Order::strategy_sell("600000", 100, 10.0),
            &b,
            &ctx(&rules, 0.0),
        );
        assert!(matches!(outcome, MatchOutcome::NoFill(NoFillReason::Suspended)));
    }

    #[test]
    fn limit_up_locked_rejects_buy() {
        let rules = cn_main();
        // prev_close 10 → upper 11. Bar pinned at 11 all day.
        let b = bar(11.0, 11.0, 10.0);
        let outcome = match_order(
            &Order::strategy_buy("600000", 1000, 11.0),
            &b,
            &ctx(&rules, 100_000.0),
        );
        assert!(matches!(outcome, MatchOutcome::NoFill(NoFillReason::LimitUp)));
    }

    #[test]
    fn touch_of_limit_without_lock_still_fills() {
        let rules = cn_main();
        // Touched the limit intraday but closed well below: buyable.
        let mut b = bar(10.5, 10.6, 10.0);
        b.high = 11.0;
        let outcome = match_order(
            &Order::strategy_buy("600000", 1000, 10.6),
            &b,
            &ctx(&rules, 100_000.0),
        );
        assert!(outcome.fill().is_some());
    }

    #[test]
    fn limit_down_locked_rejects_sell() {
        let rules = cn_main();
        // prev_close 10 → lower 9. Bar pinned at 9.
        let b = bar(9.0, 9.0, 10.0);
        let outcome = match_order(
            &Order::strategy_sell("600000", 1000, 9.0),
            &b,
            &ctx(&rules, 0.0),
        );
        assert!(matches!(outcome, MatchOutcome::NoFill(NoFillReason::LimitDown)));
    }

    #[test]
    fn crashed_bar_below_the_band_still_sells() {
        let rules = cn_main();
        // prev_close 10 → lower 9. The bar prints far below the band — data
        // a limit-governed venue cannot produce — and is treated as tradable.
        let b = bar(8.5, 8.5, 10.0);
        let fill = match_order(
            &Order::strategy_sell("600000", 1000, 8.5),
            &b,
            &ctx(&rules, 0.0),
        )
        .fill()
        .expect("out-of-band bar should fill");
        assert_eq!(fill.price, 8.5);
    }

    #[test]
    fn first_bar_disables_limit_checks() {
        let rules = cn_main();
        let b = bar(11.0, 11.0, 10.0);
        let ctx = MatchContext {
            first_bar: true,
            ..ctx(&rules, 100_000.0)
        };
        let outcome = match_order(&Order::strategy_buy("600000", 1000, 11.0), &b, &ctx);
        assert!(outcome.fill().is_some());
    }

    #[test]
    fn buy_rounds_down_to_lot() {
        let rules = cn_main();
        let fill = match_order(
            &Order::strategy_buy("600000", 1_050, 10.0),
            &bar(10.0, 10.0, 10.0),
            &ctx(&rules, 100_000.0),
        )
        .fill()
        .unwrap();
        assert_eq!(fill.shares, 1_000);
    }

    #[test]
    fn sub_lot_buy_rejected() {
        let rules = cn_main();
        let outcome = match_order(
            &Order::strategy_buy("600000", 99, 10.0),
            &bar(10.0, 10.0, 10.0),
            &ctx(&rules, 100_000.0),
        );
        assert!(matches!(outcome, MatchOutcome::NoFill(NoFillReason::LotTooSmall)));
    }

    #[test]
    fn odd_lot_sell_allowed() {
        let rules = cn_main();
        let fill = match_order(
            &Order::strategy_sell("600000", 150, 10.0),
            &bar(10.0, 10.0, 10.0),
            &ctx(&rules, 0.0),
        )
        .fill()
        .unwrap();
        assert_eq!(fill.shares, 150);
    }

    #[test]
    fn cash_clip_reduces_to_affordable_lots() {
        let rules = cn_main();
        // Wants 1000 shares at 10 = 10_000 + fees, but only 5_050 available.
        let fill = match_order(
            &Order::strategy_buy("600000", 1_000, 10.0),
            &bar(10.0, 10.0, 10.0),
            &ctx(&rules, 5_050.0),
        )
        .fill()
        .unwrap();
        assert_eq!(fill.shares, 500);
        assert!(fill.gross_amount + fill.commission <= 5_050.0);
    }

    #[test]
    fn commission_overflow_on_single_lot_rejects() {
        let rules = cn_main();
        // Exactly one lot's gross but not the commission on top.
        let outcome = match_order(
            &Order::strategy_buy("600000", 100, 10.0),
            &bar(10.0, 10.0, 10.0),
            &ctx(&rules, 1_000.0),
        );
        assert!(matches!(
            outcome,
            MatchOutcome::NoFill(NoFillReason::InsufficientCash)
        ));
    }

    #[test]
    fn no_cash_at_all_rejected() {
        let rules = cn_main();
        let outcome = match_order(
            &Order::strategy_buy("600000", 1_000, 10.0),
            &bar(10.0, 10.0, 10.0),
            &ctx(&rules, 50.0),
        );
        assert!(matches!(
            outcome,
            MatchOutcome::NoFill(NoFillReason::InsufficientCash)
        ));
    }

    #[test]
    fn forced_exit_reason_carried_on_fill() {
        let rules = cn_main();
        let order = Order::forced_exit("600000", 1000, 9.5, TradeReason::StopLoss);
        let fill = match_order(&order, &bar(9.5, 9.4, 10.0), &ctx(&rules, 0.0))
            .fill()
            .unwrap();
        assert_eq!(fill.reason, TradeReason::StopLoss);
    }

    #[test]
    fn money_rounded_to_market_minor_unit() {
        let rules = cn_main();
        let ctx = MatchContext {
            slippage_bps: 5.0,
            ..ctx(&rules, 1_000_000.0)
        };
        let fill = match_order(
            &Order::strategy_buy("600000", 300, 33.33),
            &bar(33.33, 33.4, 33.0),
            &ctx,
        )
        .fill()
        .unwrap();
        // 33.33 * 1.0005 = 33.346665 → 33.35 at two decimals.
        assert_eq!(fill.price, 33.35);
        let cents = (fill.net_cash_delta * 100.0).round() / 100.0;
        assert!((fill.net_cash_delta - cents).abs() < 1e-9);
    }
}
