//! Performance metrics — pure functions over the final equity series and
//! fills.
//!
//! Every metric with a denominator reports `None` (JSON `null`) when that
//! denominator is zero — never `NaN` or infinity. Annualization assumes 252
//! trading days.

use crate::trades::RoundTrip;
use serde::{Deserialize, Serialize};
use stocklab_core::domain::{EquitySample, Fill};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Aggregate metrics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub total_return: Option<f64>,
    pub cagr: Option<f64>,
    pub volatility: Option<f64>,
    pub max_drawdown: Option<f64>,
    /// Longest run of bars spent below a previous equity peak.
    pub max_drawdown_duration: Option<u32>,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub calmar: Option<f64>,
    pub win_rate: Option<f64>,
    pub profit_factor: Option<f64>,
    /// Mean round-trip holding period, in bars.
    pub avg_holding_period: Option<f64>,
    /// Annualized: total traded notional over twice the average equity.
    pub turnover: Option<f64>,
    pub round_trips: usize,
    pub fill_count: usize,
}

impl MetricsReport {
    /// Compute all metrics. `risk_free_rate` is annualized (0 by default at
    /// the call sites).
    pub fn compute(
        equity_curve: &[EquitySample],
        fills: &[Fill],
        trades: &[RoundTrip],
        risk_free_rate: f64,
    ) -> Self {
        let equity: Vec<f64> = equity_curve.iter().map(|s| s.equity).collect();
        let returns = daily_returns(&equity);
        let n_days = equity.len();

        Self {
            total_return: total_return(&equity),
            cagr: cagr(&equity, n_days),
            volatility: volatility(&returns),
            max_drawdown: max_drawdown(&equity),
            max_drawdown_duration: max_drawdown_duration(&equity),
            sharpe: sharpe(&returns, risk_free_rate),
            sortino: sortino(&returns, risk_free_rate),
            calmar: calmar(&equity, n_days),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            avg_holding_period: avg_holding_period(trades),
            turnover: turnover(fills, &equity, n_days),
            round_trips: trades.len(),
            fill_count: fills.len(),
        }
    }
}

/// Simple daily returns between consecutive equity samples.
pub fn daily_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .filter_map(|w| {
            if w[0] > 0.0 {
                Some((w[1] - w[0]) / w[0])
            } else {
                None
            }
        })
        .collect()
}

pub fn total_return(equity: &[f64]) -> Option<f64> {
    let first = *equity.first()?;
    let last = *equity.last()?;
    if first <= 0.0 {
        return None;
    }
    Some(last / first - 1.0)
}

pub fn cagr(equity: &[f64], trading_days: usize) -> Option<f64> {
    if trading_days < 2 {
        return None;
    }
    let first = *equity.first()?;
    let last = *equity.last()?;
    if first <= 0.0 || last <= 0.0 {
        return None;
    }
    Some((last / first).powf(TRADING_DAYS_PER_YEAR / trading_days as f64) - 1.0)
}

pub fn volatility(returns: &[f64]) -> Option<f64> {
    let sd = std_dev(returns)?;
    Some(sd * TRADING_DAYS_PER_YEAR.sqrt())
}

pub fn max_drawdown(equity: &[f64]) -> Option<f64> {
    if equity.is_empty() {
        return None;
    }
    let mut peak = equity[0];
    let mut worst = 0.0_f64;
    for &e in equity {
        if e > peak {
            peak = e;
        }
        if peak > 0.0 {
            let dd = (e - peak) / peak;
            if dd < worst {
                worst = dd;
            }
        }
    }
    Some(worst)
}

pub fn max_drawdown_duration(equity: &[f64]) -> Option<u32> {
    if equity.is_empty() {
        return None;
    }
    let mut peak = equity[0];
    let mut current = 0u32;
    let mut longest = 0u32;
    for &e in equity {
        if e >= peak {
            peak = e;
            current = 0;
        } else {
            current += 1;
            longest = longest.max(current);
        }
    }
    Some(longest)
}

pub fn sharpe(returns: &[f64], risk_free_rate: f64) -> Option<f64> {
    let sd = std_dev(returns)?;
    if sd == 0.0 {
        return None;
    }
    let mean = mean(returns);
    Some((mean - risk_free_rate / TRADING_DAYS_PER_YEAR) / sd * TRADING_DAYS_PER_YEAR.sqrt())
}

pub fn sortino(returns: &[f64], risk_free_rate: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let downside_sq: f64 = returns
        .iter()
        .map(|r| r - daily_rf)
        .filter(|r| *r < 0.0)
        .map(|r| r * r)
        .sum();
    let downside = (downside_sq / returns.len() as f64).sqrt();
    if downside == 0.0 {
        return None;
    }
    let mean_excess = mean(returns) - daily_rf;
    Some(mean_excess / downside * TRADING_DAYS_PER_YEAR.sqrt())
}

pub fn calmar(equity: &[f64], trading_days: usize) -> Option<f64> {
    let growth = cagr(equity, trading_days)?;
    let dd = max_drawdown(equity)?;
    if dd == 0.0 {
        return None;
    }
    Some(growth / dd.abs())
}

pub fn win_rate(trades: &[RoundTrip]) -> Option<f64> {
    if trades.is_empty() {
        return None;
    }
    let wins = trades.iter().filter(|t| t.net_pnl > 0.0).count();
    Some(wins as f64 / trades.len() as f64)
}

pub fn profit_factor(trades: &[RoundTrip]) -> Option<f64> {
    let gains: f64 = trades.iter().filter(|t| t.net_pnl > 0.0).map(|t| t.net_pnl).sum();
    let losses: f64 = trades
        .iter()
        .filter(|t| t.net_pnl < 0.0)
        .map(|t| t.net_pnl.abs())
        .sum();
    if losses == 0.0 {
        return None;
    }
    Some(gains / losses)
}

pub fn avg_holding_period(trades: &[RoundTrip]) -> Option<f64> {
    if trades.is_empty() {
        return None;
    }
    let total: u32 = trades.iter().map(|t| t.bars_held).sum();
    Some(total as f64 / trades.len() as f64)
}

pub fn turnover(fills: &[Fill], equity: &[f64], trading_days: usize) -> Option<f64> {
    if trading_days < 2 {
        return None;
    }
    let avg_equity = mean(equity);
    if avg_equity == 0.0 {
        return None;
    }
    let years = trading_days as f64 / TRADING_DAYS_PER_YEAR;
    let notional: f64 = fills.iter().map(|f| f.gross_amount.abs()).sum();
    Some(notional / (2.0 * avg_equity) / years)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation. None below two observations.
fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}
