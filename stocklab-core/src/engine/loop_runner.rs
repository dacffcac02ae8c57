//! Bar-by-bar trading loop — the heart of the backtesting engine.
//!
//! Five steps per bar:
//! 1. Mark-to-market at the open (suspended symbols carry the last price)
//! 2. Forced exits from the risk manager, matched at the open
//! 3. Strategy sell at the close, gated by the settlement horizon
//! 4. Strategy buy at the close, sized under cash and risk caps
//! 5. End-of-bar equity sample at close prices
//!
//! Precedence: forced exit > strategy sell > strategy buy. A symbol with a
//! forced exit this bar never takes a strategy buy on the same bar. The loop
//! is single-threaded; no bar begins before the prior bar's ledger commits.

use crate::domain::{
    Bar, EquitySample, Fill, Order, OrderSide, Portfolio, RiskEvent, StockInfo,
};
use crate::matching::{match_order, MatchContext, MatchOutcome};
use crate::risk::RiskManager;
use crate::strategy::Signal;
use crate::venue::{OrderCheckContext, Ruleset};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use super::cancel::CancelToken;
use super::sizing::size_buy;

/// Engine knobs that are not part of the ruleset.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub initial_capital: f64,
    pub slippage_bps: f64,
    /// The account holds the board authorization (GEM/STAR/BSE agreements).
    pub board_authorized: bool,
}

impl EngineConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            slippage_bps: crate::matching::DEFAULT_SLIPPAGE_BPS,
            board_authorized: true,
        }
    }
}

/// Invariant violations — the only fatal category inside the loop.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{bars} bars but {signals} signals")]
    SignalLengthMismatch { bars: usize, signals: usize },

    #[error("cash went negative at bar {bar_index}: {cash}")]
    NegativeCash { bar_index: usize, cash: f64 },
}

/// Everything a run produced, in deterministic order.
#[derive(Debug)]
pub struct EngineOutput {
    pub fills: Vec<Fill>,
    pub equity_curve: Vec<EquitySample>,
    pub risk_events: Vec<RiskEvent>,
    pub cancelled: bool,
    pub portfolio: Portfolio,
}

struct EngineState {
    portfolio: Portfolio,
    /// Last tradable price per symbol; carries across suspensions.
    last_prices: BTreeMap<String, f64>,
    /// Bar index at which each open position last added shares (T+N checks).
    acquired_index: BTreeMap<String, usize>,
    fills: Vec<Fill>,
    events: Vec<RiskEvent>,
    equity_curve: Vec<EquitySample>,
}

impl EngineState {
    fn new(initial_capital: f64) -> Self {
        Self {
            portfolio: Portfolio::new(initial_capital),
            last_prices: BTreeMap::new(),
            acquired_index: BTreeMap::new(),
            fills: Vec::new(),
            events: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    fn apply_fill(&mut self, fill: &Fill, bar_index: usize) {
        match fill.side {
            OrderSide::Buy => {
                self.portfolio.apply_buy(
                    &fill.symbol,
                    fill.shares,
                    -fill.net_cash_delta,
                    fill.commission,
                    fill.taxes,
                    fill.date,
                );
                self.acquired_index.insert(fill.symbol.clone(), bar_index);
            }
            OrderSide::Sell => {
                self.portfolio.apply_sell(
                    &fill.symbol,
                    fill.shares,
                    fill.net_cash_delta,
                    fill.commission,
                    fill.taxes,
                );
                if !self.portfolio.has_position(&fill.symbol) {
                    self.acquired_index.remove(&fill.symbol);
                }
            }
        }
        self.fills.push(fill.clone());
    }

    fn days_held(&self, symbol: &str, bar_index: usize) -> Option<u32> {
        self.acquired_index
            .get(symbol)
            .map(|&acquired| (bar_index - acquired) as u32)
    }
}

/// Run the engine over one symbol's bar sequence with pre-generated signals.
///
/// `signals` must be the same length as `bars`. The output is byte-identical
/// across invocations with identical inputs: no clock, no RNG, and every
/// collection iterates in stable order.
pub fn run_engine(
    bars: &[Bar],
    signals: &[Signal],
    stock_info: &StockInfo,
    ruleset: &Ruleset,
    config: &EngineConfig,
    risk: &mut RiskManager,
    cancel: &CancelToken,
) -> Result<EngineOutput, EngineError> {
    if bars.len() != signals.len() {
        return Err(EngineError::SignalLengthMismatch {
            bars: bars.len(),
            signals: signals.len(),
        });
    }

    let mut state = EngineState::new(config.initial_capital);
    let mut cancelled = false;

    for (i, bar) in bars.iter().enumerate() {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        let symbol = bar.symbol.as_str();
        let first_bar = i == 0;
        let ipo_age = stock_info.ipo_age_days(bar.date);

        // ─── Step 1: mark-to-market at the open ───
        let mut open_prices = state.last_prices.clone();
        if !bar.is_untradable() {
            open_prices.insert(symbol.to_string(), bar.open);
        }

        // ─── Step 2: forced exits ───
        let forced_orders = risk.check_exit_signals(&state.portfolio, &open_prices);
        let mut forced_symbols: BTreeSet<String> = BTreeSet::new();
        for order in forced_orders {
            forced_symbols.insert(order.symbol.clone());
            state.events.push(RiskEvent::forced_exit(
                bar.date,
                order.reason.as_str(),
                &order.symbol,
                format!(
                    "forced exit of {} shares at reference {:.4}",
                    order.shares, order.reference_price
                ),
            ));

            // Only the run symbol has a bar to match against today.
            if order.symbol != symbol {
                continue;
            }

            let ctx = OrderCheckContext {
                board_authorized: config.board_authorized,
                trading_days_since_acquired: state.days_held(&order.symbol, i),
            };
            if let Err(rejection) = ruleset.validate_order(&order, &state.portfolio, bar, &ctx) {
                state.events.push(RiskEvent::rejected(
                    bar.date,
                    rejection.code(),
                    &order.symbol,
                    rejection.to_string(),
                ));
                continue;
            }

            let match_ctx = MatchContext {
                ruleset,
                slippage_bps: config.slippage_bps,
                first_bar,
                ipo_age_days: ipo_age,
                available_cash: state.portfolio.cash,
            };
            // Forced exits resolve at the open.
            let order = Order {
                reference_price: bar.open,
                ..order
            };
            match match_order(&order, bar, &match_ctx) {
                MatchOutcome::Filled(fill) => state.apply_fill(&fill, i),
                MatchOutcome::NoFill(reason) => state.events.push(RiskEvent::rejected(
                    bar.date,
                    reason.code(),
                    &order.symbol,
                    format!("forced exit could not fill: {}", reason.code()),
                )),
            }
        }

        // Close prices govern strategy orders and the equity sample.
        if !bar.is_untradable() {
            state.last_prices.insert(symbol.to_string(), bar.close);
        }
        let close_prices = state.last_prices.clone();

        // ─── Step 3: strategy sell (risk-first) ───
        // A sell signal arriving before any position exists is held back; if
        // a buy lands later this bar it is re-evaluated against the fresh
        // position, where a T+1 horizon then blocks it with
        // SETTLEMENT_BLOCKED. Either way the signal dies with this bar.
        let mut deferred_sell = false;
        if signals[i].sell {
            if state.portfolio.has_position(symbol) {
                submit_strategy_sell(&mut state, bar, i, first_bar, ipo_age, ruleset, config);
            } else {
                deferred_sell = true;
            }
        }

        // ─── Step 4: strategy buy ───
        // A forced exit on this bar wins over the buy; holding a position
        // means no pyramiding.
        if signals[i].buy
            && !forced_symbols.contains(symbol)
            && !state.portfolio.has_position(symbol)
        {
            let equity = state.portfolio.equity(&close_prices);
            let total_value = state.portfolio.position_value(&close_prices);
            let sized = size_buy(
                state.portfolio.cash,
                equity,
                0.0,
                total_value,
                bar.close,
                ruleset.lot_size(),
                risk.config(),
            );

            if sized.shares == 0 {
                state.events.push(RiskEvent::rejected(
                    bar.date,
                    sized.bound.code(),
                    symbol,
                    "buy sized to zero shares".to_string(),
                ));
            } else {
                let order = Order::strategy_buy(symbol, sized.shares, bar.close);
                let ctx = OrderCheckContext {
                    board_authorized: config.board_authorized,
                    trading_days_since_acquired: None,
                };
                let validated = ruleset
                    .validate_order(&order, &state.portfolio, bar, &ctx)
                    .map_err(|r| (r.code(), r.to_string()))
                    .and_then(|()| {
                        risk.check_order_risk(&order, &state.portfolio, &close_prices)
                            .map_err(|r| (r.code(), r.to_string()))
                    });
                match validated {
                    Err((code, detail)) => {
                        state
                            .events
                            .push(RiskEvent::rejected(bar.date, code, symbol, detail));
                    }
                    Ok(()) => {
                        let match_ctx = MatchContext {
                            ruleset,
                            slippage_bps: config.slippage_bps,
                            first_bar,
                            ipo_age_days: ipo_age,
                            available_cash: state.portfolio.cash,
                        };
                        match match_order(&order, bar, &match_ctx) {
                            MatchOutcome::Filled(fill) => state.apply_fill(&fill, i),
                            MatchOutcome::NoFill(reason) => state.events.push(RiskEvent::rejected(
                                bar.date,
                                reason.code(),
                                symbol,
                                format!("strategy buy could not fill: {}", reason.code()),
                            )),
                        }
                    }
                }
            }
        }

        // Same-bar sell signal against a same-bar buy.
        if deferred_sell && state.portfolio.has_position(symbol) {
            submit_strategy_sell(&mut state, bar, i, first_bar, ipo_age, ruleset, config);
        }

        // ─── Step 5: end-of-bar equity sample ───
        let position_value = state.portfolio.position_value(&close_prices);
        let equity = state.portfolio.cash + position_value;
        state.equity_curve.push(EquitySample {
            date: bar.date,
            equity,
            cash: state.portfolio.cash,
            position_value,
        });
        risk.observe_equity(equity);

        // Ledger invariants, checked at every bar boundary.
        if state.portfolio.cash < -1e-6 {
            return Err(EngineError::NegativeCash {
                bar_index: i,
                cash: state.portfolio.cash,
            });
        }
        debug_assert!(
            state.portfolio.positions.values().all(|p| p.shares > 0),
            "flat positions must be removed"
        );
        debug_assert!(
            (state.portfolio.equity(&close_prices) - equity).abs() < 1e-6,
            "equity identity must hold"
        );
    }

    Ok(EngineOutput {
        fills: state.fills,
        equity_curve: state.equity_curve,
        risk_events: state.events,
        cancelled,
        portfolio: state.portfolio,
    })
}

/// Validate and match a full-position strategy sell at the bar close.
fn submit_strategy_sell(
    state: &mut EngineState,
    bar: &Bar,
    bar_index: usize,
    first_bar: bool,
    ipo_age: Option<i64>,
    ruleset: &Ruleset,
    config: &EngineConfig,
) {
    let symbol = bar.symbol.as_str();
    let Some(position) = state.portfolio.get_position(symbol) else {
        return;
    };
    let order = Order::strategy_sell(symbol, position.shares, bar.close);
    let ctx = OrderCheckContext {
        board_authorized: config.board_authorized,
        trading_days_since_acquired: state.days_held(symbol, bar_index),
    };
    if let Err(rejection) = ruleset.validate_order(&order, &state.portfolio, bar, &ctx) {
        // The signal is dropped, not queued for the next day.
        state.events.push(RiskEvent::rejected(
            bar.date,
            rejection.code(),
            symbol,
            rejection.to_string(),
        ));
        return;
    }
    let match_ctx = MatchContext {
        ruleset,
        slippage_bps: config.slippage_bps,
        first_bar,
        ipo_age_days: ipo_age,
        available_cash: state.portfolio.cash,
    };
    match match_order(&order, bar, &match_ctx) {
        MatchOutcome::Filled(fill) => state.apply_fill(&fill, bar_index),
        MatchOutcome::NoFill(reason) => state.events.push(RiskEvent::rejected(
            bar.date,
            reason.code(),
            symbol,
            format!("strategy sell could not fill: {}", reason.code()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::adapter::chain_prev_close;
    use crate::domain::{RiskEventKind, TradeReason};
    use crate::risk::RiskConfig;
    use crate::venue::{Board, Channel, CommissionOverrides, Market, RulesRegistry, TradingEnvironment};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    /// CN main-board ruleset with all fees zeroed: scenario arithmetic stays
    /// exact.
    fn free_rules() -> Ruleset {
        RulesRegistry::builtin()
            .unwrap()
            .ruleset(TradingEnvironment::new(Market::Cn, Board::Main, Channel::Direct))
            .unwrap()
            .with_commission_overrides(&CommissionOverrides::zero())
    }

    fn info() -> StockInfo {
        StockInfo {
            symbol: "600000".into(),
            name: "Test".into(),
            ipo_date: NaiveDate::from_ymd_opt(2020, 1, 1),
            exchange: "SSE".into(),
        }
    }

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        let mut bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                Bar {
                    symbol: "600000".into(),
                    date: day(2 + i as u32),
                    open,
                    high: open.max(close),
                    low: open.min(close),
                    close,
                    volume: 1_000_000,
                    prev_close: 0.0,
                    suspended: false,
                }
            })
            .collect();
        chain_prev_close(&mut bars);
        bars
    }

    fn no_signals(n: usize) -> Vec<Signal> {
        vec![Signal::NONE; n]
    }

    fn config_zero_slip(capital: f64) -> EngineConfig {
        EngineConfig {
            initial_capital: capital,
            slippage_bps: 0.0,
            board_authorized: true,
        }
    }

    #[test]
    fn flat_run_keeps_equity_constant() {
        let bars = bars_from_closes(&[10.0, 11.0, 12.0]);
        let rules = free_rules();
        let mut risk = RiskManager::new(RiskConfig::default(), 100_000.0);
        let out = run_engine(
            &bars,
            &no_signals(3),
            &info(),
            &rules,
            &config_zero_slip(100_000.0),
            &mut risk,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(out.equity_curve.len(), 3);
        assert!(out.fills.is_empty());
        assert!(out.equity_curve.iter().all(|s| s.equity == 100_000.0));
    }

    #[test]
    fn buy_then_sell_happy_path() {
        // S1: closes [10, 11, 10, 11, 12], buy day 1, sell day 4.
        let bars = bars_from_closes(&[10.0, 11.0, 10.0, 11.0, 12.0]);
        let mut signals = no_signals(5);
        signals[0].buy = true;
        signals[3].sell = true;

        let rules = free_rules();
        let mut risk = RiskManager::new(RiskConfig::default(), 100_000.0);
        let out = run_engine(
            &bars,
            &signals,
            &info(),
            &rules,
            &config_zero_slip(100_000.0),
            &mut risk,
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(out.fills.len(), 2);
        assert_eq!(out.fills[0].side, OrderSide::Buy);
        assert_eq!(out.fills[0].shares, 10_000);
        assert_eq!(out.fills[0].price, 10.0);
        assert_eq!(out.fills[1].side, OrderSide::Sell);
        assert_eq!(out.fills[1].shares, 10_000);
        assert_eq!(out.fills[1].price, 11.0);
        let final_equity = out.equity_curve.last().unwrap().equity;
        assert!((final_equity - 110_000.0).abs() < 1e-6);
        assert!(out.portfolio.positions.is_empty());
    }

    #[test]
    fn t_plus_one_blocks_same_day_sell() {
        // S2: buy and sell signals both on day 0. The buy executes; the
        // same-day sell is rejected with SETTLEMENT_BLOCKED and dropped.
        let bars = bars_from_closes(&[10.0, 11.0, 10.0, 11.0, 12.0]);
        let mut signals = no_signals(5);
        signals[0].buy = true;
        signals[0].sell = true;

        let rules = free_rules();
        let mut risk = RiskManager::new(RiskConfig::default(), 100_000.0);
        let out = run_engine(
            &bars,
            &signals,
            &info(),
            &rules,
            &config_zero_slip(100_000.0),
            &mut risk,
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.fills[0].side, OrderSide::Buy);
        let event = out
            .risk_events
            .iter()
            .find(|e| e.subkind == "SETTLEMENT_BLOCKED")
            .expect("same-day sell must be settlement-blocked");
        assert_eq!(event.date, day(2));
        // The signal was dropped, not queued: the position rides to the end.
        assert!(out.portfolio.has_position("600000"));
    }

    #[test]
    fn next_day_sell_clears_t_plus_one() {
        let bars = bars_from_closes(&[10.0, 11.0, 12.0]);
        let mut signals = no_signals(3);
        signals[0].buy = true;
        signals[1].sell = true;

        let rules = free_rules();
        let mut risk = RiskManager::new(RiskConfig::default(), 100_000.0);
        let out = run_engine(
            &bars,
            &signals,
            &info(),
            &rules,
            &config_zero_slip(100_000.0),
            &mut risk,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(out.fills.len(), 2);
        assert_eq!(out.fills[1].side, OrderSide::Sell);
        assert_eq!(out.fills[1].date, day(3));
        assert!(out
            .risk_events
            .iter()
            .all(|e| e.subkind != "SETTLEMENT_BLOCKED"));
    }

    #[test]
    fn limit_up_locked_buy_rejected_with_event() {
        // S3: day 1 pinned limit-up at 11 (prev close 10).
        let mut bars = bars_from_closes(&[10.0, 11.0, 11.5]);
        bars[1].open = 11.0;
        bars[1].high = 11.0;
        bars[1].low = 11.0;
        let mut signals = no_signals(3);
        signals[1].buy = true;

        let rules = free_rules();
        let mut risk = RiskManager::new(RiskConfig::default(), 100_000.0);
        let out = run_engine(
            &bars,
            &signals,
            &info(),
            &rules,
            &config_zero_slip(100_000.0),
            &mut risk,
            &CancelToken::new(),
        )
        .unwrap();

        assert!(out.fills.is_empty());
        let event = out
            .risk_events
            .iter()
            .find(|e| e.kind == RiskEventKind::OrderRejected)
            .expect("limit-up rejection recorded");
        assert_eq!(event.subkind, "LIMIT_UP");
        assert_eq!(out.equity_curve.last().unwrap().equity, 100_000.0);
    }

    #[test]
    fn stop_loss_forces_exit_at_open() {
        // S4: closes [10, 10, 8.5], stop-loss 10%, buy day 0.
        let mut bars = bars_from_closes(&[10.0, 10.0, 8.5]);
        bars[2].open = 8.8; // gap down through the stop at the open
        bars[2].low = 8.4;
        let mut signals = no_signals(3);
        signals[0].buy = true;

        let rules = free_rules();
        let config = config_zero_slip(100_000.0);
        let risk_config = RiskConfig {
            stop_loss_pct: Some(0.10),
            ..RiskConfig::default()
        };
        let mut risk = RiskManager::new(risk_config, 100_000.0);
        let out = run_engine(
            &bars,
            &signals,
            &info(),
            &rules,
            &config,
            &mut risk,
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(out.fills.len(), 2);
        let exit = &out.fills[1];
        assert_eq!(exit.reason, TradeReason::StopLoss);
        assert_eq!(exit.price, 8.8); // at the day-3 open
        assert!(out
            .risk_events
            .iter()
            .any(|e| e.kind == RiskEventKind::ForcedExit && e.subkind == "STOP_LOSS"));
        // Loss ≈ 12% of capital on a full-size position.
        let final_equity = out.equity_curve.last().unwrap().equity;
        assert!((final_equity - 88_000.0).abs() < 1e-6);
        assert!(out.portfolio.positions.is_empty());
    }

    #[test]
    fn drawdown_protection_preempts_stop_profit() {
        // S5 single-symbol: equity peaks then slides 20%+ while the position
        // itself is still above its stop-profit trigger.
        let mut closes = vec![10.0, 13.0]; // +30% run-up, peak 130k
        closes.extend([9.9, 9.9]); // slide to ~99k (< 0.8 * 130k)
        let bars = bars_from_closes(&closes);
        let mut signals = no_signals(bars.len());
        signals[0].buy = true;

        let rules = free_rules();
        let risk_config = RiskConfig {
            max_drawdown_pct: Some(0.20),
            stop_profit_pct: Some(0.50),
            ..RiskConfig::default()
        };
        let mut risk = RiskManager::new(risk_config, 100_000.0);
        let out = run_engine(
            &bars,
            &signals,
            &info(),
            &rules,
            &config_zero_slip(100_000.0),
            &mut risk,
            &CancelToken::new(),
        )
        .unwrap();

        let exit = out
            .fills
            .iter()
            .find(|f| f.side == OrderSide::Sell)
            .expect("forced exit fill");
        assert_eq!(exit.reason, TradeReason::DrawdownProtection);
        // P8: the book is empty at the end of the trigger bar.
        assert!(out.portfolio.positions.is_empty());
    }

    #[test]
    fn position_cap_clips_proactively_without_rejection() {
        // S6: cap 30%, equity 100k, price 50 → 600 shares, no events.
        let bars = bars_from_closes(&[50.0, 51.0]);
        let mut signals = no_signals(2);
        signals[0].buy = true;

        let rules = free_rules();
        let risk_config = RiskConfig {
            max_position_pct: Some(0.30),
            ..RiskConfig::default()
        };
        let mut risk = RiskManager::new(risk_config.clone(), 100_000.0);
        let out = run_engine(
            &bars,
            &signals,
            &info(),
            &rules,
            &config_zero_slip(100_000.0),
            &mut risk,
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.fills[0].shares, 600);
        assert_eq!(out.fills[0].gross_amount, 30_000.0);
        assert!(out.risk_events.is_empty(), "proactive sizing avoids churn");
    }

    #[test]
    fn forced_exit_wins_over_same_bar_buy() {
        // I7: stop-loss fires on a bar that also carries a buy signal.
        let mut bars = bars_from_closes(&[10.0, 10.0, 8.5, 8.6]);
        bars[2].open = 8.8;
        let mut signals = no_signals(4);
        signals[0].buy = true;
        signals[2].buy = true; // dropped: forced exit wins

        let rules = free_rules();
        let risk_config = RiskConfig {
            stop_loss_pct: Some(0.10),
            ..RiskConfig::default()
        };
        let mut risk = RiskManager::new(risk_config, 100_000.0);
        let out = run_engine(
            &bars,
            &signals,
            &info(),
            &rules,
            &config_zero_slip(100_000.0),
            &mut risk,
            &CancelToken::new(),
        )
        .unwrap();

        let day3_buys: Vec<&Fill> = out
            .fills
            .iter()
            .filter(|f| f.date == day(4) && f.side == OrderSide::Buy)
            .collect();
        assert!(day3_buys.is_empty(), "buy on the forced-exit bar must drop");
    }

    #[test]
    fn suspended_bar_carries_equity_and_rejects_orders() {
        let mut bars = bars_from_closes(&[10.0, 10.0, 11.0]);
        bars[1].suspended = true;
        bars[1].volume = 0;
        let mut signals = no_signals(3);
        signals[0].buy = true;
        signals[1].sell = true; // suspended: rejected

        let rules = free_rules();
        let mut risk = RiskManager::new(RiskConfig::default(), 100_000.0);
        let out = run_engine(
            &bars,
            &signals,
            &info(),
            &rules,
            &config_zero_slip(100_000.0),
            &mut risk,
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(out.fills.len(), 1); // only the buy
        assert!(out.risk_events.iter().any(|e| e.subkind == "SUSPENDED"));
        // Suspended day marks at the carried price: equity unchanged.
        assert_eq!(out.equity_curve[1].equity, out.equity_curve[0].equity);
    }

    #[test]
    fn cancellation_returns_partial_result() {
        let bars = bars_from_closes(&[10.0, 10.5, 11.0, 11.5]);
        let rules = free_rules();
        let mut risk = RiskManager::new(RiskConfig::default(), 100_000.0);
        let cancel = CancelToken::new();
        cancel.cancel();
        let out = run_engine(
            &bars,
            &no_signals(4),
            &info(),
            &rules,
            &config_zero_slip(100_000.0),
            &mut risk,
            &cancel,
        )
        .unwrap();
        assert!(out.cancelled);
        assert!(out.equity_curve.is_empty());
    }

    #[test]
    fn signal_length_mismatch_is_fatal() {
        let bars = bars_from_closes(&[10.0, 10.5]);
        let rules = free_rules();
        let mut risk = RiskManager::new(RiskConfig::default(), 100_000.0);
        let err = run_engine(
            &bars,
            &no_signals(3),
            &info(),
            &rules,
            &config_zero_slip(100_000.0),
            &mut risk,
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::SignalLengthMismatch { .. }));
    }

    #[test]
    fn identical_inputs_identical_outputs() {
        // P6 at the engine level.
        let bars = bars_from_closes(&[10.0, 10.4, 10.1, 10.9, 11.3, 10.8]);
        let mut signals = no_signals(6);
        signals[0].buy = true;
        signals[3].sell = true;
        signals[4].buy = true;

        let rules = free_rules();
        let run = || {
            let mut risk = RiskManager::new(
                RiskConfig {
                    stop_loss_pct: Some(0.05),
                    ..RiskConfig::default()
                },
                100_000.0,
            );
            run_engine(
                &bars,
                &signals,
                &info(),
                &rules,
                &config_zero_slip(100_000.0),
                &mut risk,
                &CancelToken::new(),
            )
            .unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(serde_json::to_string(&a.fills).unwrap(), serde_json::to_string(&b.fills).unwrap());
        assert_eq!(
            serde_json::to_string(&a.equity_curve).unwrap(),
            serde_json::to_string(&b.equity_curve).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&a.risk_events).unwrap(),
            serde_json::to_string(&b.risk_events).unwrap()
        );
    }

    #[test]
    fn slippage_and_commission_reduce_final_equity() {
        // P7: friction can only cost money.
        let bars = bars_from_closes(&[10.0, 11.0, 10.0, 11.0, 12.0]);
        let mut signals = no_signals(5);
        signals[0].buy = true;
        signals[3].sell = true;

        let registry = RulesRegistry::builtin().unwrap();
        let real_rules = registry
            .ruleset(TradingEnvironment::new(Market::Cn, Board::Main, Channel::Direct))
            .unwrap();
        let free = free_rules();

        let run = |rules: &Ruleset, slip: f64| {
            let mut risk = RiskManager::new(RiskConfig::default(), 100_000.0);
            let config = EngineConfig {
                initial_capital: 100_000.0,
                slippage_bps: slip,
                board_authorized: true,
            };
            run_engine(
                &bars,
                &signals,
                &info(),
                rules,
                &config,
                &mut risk,
                &CancelToken::new(),
            )
            .unwrap()
            .equity_curve
            .last()
            .unwrap()
            .equity
        };

        let frictionless = run(&free, 0.0);
        let with_costs = run(&real_rules, 5.0);
        assert!(with_costs <= frictionless);
    }
}
