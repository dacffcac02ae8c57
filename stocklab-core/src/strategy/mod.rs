//! Strategy engine — signal generation over bar history.
//!
//! Strategies are pure: `generate_signals(bars, params)` returns one
//! `(buy, sell)` pair per bar, and the pair at index `i` may consult bars
//! `0..=i` but never `i+1..`. Indicator warmup shows up as signal-free
//! prefixes, never as look-ahead.

pub mod bollinger_breakout;
pub mod combine;
pub mod kdj_cross;
pub mod ma_cross;
pub mod macd_cross;
pub mod params;
pub mod registry;
pub mod rsi_reversion;

pub use combine::{combine_signals, CombineError, Combiner};
pub use params::{ParamError, ParamKind, ParamMap, ParamSpec, ParamValue};
pub use registry::StrategyRegistry;

use crate::domain::Bar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// One bar's signal pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub buy: bool,
    pub sell: bool,
}

impl Signal {
    pub const NONE: Signal = Signal {
        buy: false,
        sell: false,
    };

    pub fn buy() -> Signal {
        Signal {
            buy: true,
            sell: false,
        }
    }

    pub fn sell() -> Signal {
        Signal {
            buy: false,
            sell: true,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StrategyError {
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error(transparent)]
    Param(#[from] ParamError),
}

/// Snapshot of where the strategy stands on the most recent bar; consumed by
/// surrounding code (advice panels, notifications). The engine itself never
/// reads this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalAnalysis {
    pub status: SignalStatus,
    /// How close the strategy is to flipping, in [0, 1]; 1 = at the trigger.
    pub proximity: f64,
    pub indicators: BTreeMap<String, f64>,
    pub suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Buy,
    Sell,
    Hold,
}

/// A registered strategy.
pub trait Strategy: Send + Sync {
    /// Stable identifier used in configs.
    fn id(&self) -> &'static str;

    /// Declarative parameter list (name, kind, default, range, description).
    fn params(&self) -> Vec<ParamSpec>;

    /// Generate one signal pair per bar. Must be pure and free of look-ahead.
    fn generate_signals(&self, bars: &[Bar], params: &ParamMap) -> Result<Vec<Signal>, StrategyError>;

    /// Describe the latest bar's signal state. The default derives it from
    /// the final generated signal; strategies may override with richer
    /// indicator snapshots.
    fn analyze_current_signal(
        &self,
        bars: &[Bar],
        params: &ParamMap,
    ) -> Result<SignalAnalysis, StrategyError> {
        let signals = self.generate_signals(bars, params)?;
        let last = signals.last().copied().unwrap_or(Signal::NONE);
        let status = if last.sell {
            SignalStatus::Sell
        } else if last.buy {
            SignalStatus::Buy
        } else {
            SignalStatus::Hold
        };
        Ok(SignalAnalysis {
            status,
            proximity: if status == SignalStatus::Hold { 0.0 } else { 1.0 },
            indicators: BTreeMap::new(),
            suggestion: match status {
                SignalStatus::Buy => "entry conditions met on the latest bar".into(),
                SignalStatus::Sell => "exit conditions met on the latest bar".into(),
                SignalStatus::Hold => "no active signal".into(),
            },
        })
    }
}

/// Validate params against the strategy's specs before generating.
pub fn validated_signals(
    strategy: &dyn Strategy,
    bars: &[Bar],
    params: &ParamMap,
) -> Result<Vec<Signal>, StrategyError> {
    params::validate_params(&strategy.params(), params)?;
    strategy.generate_signals(bars, params)
}

/// Extract the close series from bars; suspended bars carry the previous
/// close so indicators see a gap-free series.
pub(crate) fn close_series(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .map(|b| if b.suspended { b.prev_close } else { b.close })
        .collect()
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    /// Build a weekday-dated bar series from closes; open = previous close.
    pub fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut date = base;
        let mut prev = closes.first().copied().unwrap_or(0.0);
        let mut bars = Vec::with_capacity(closes.len());
        for (i, &close) in closes.iter().enumerate() {
            while matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun) {
                date = date.succ_opt().unwrap();
            }
            let open = if i == 0 { close } else { prev };
            bars.push(Bar {
                symbol: symbol.to_string(),
                date,
                open,
                high: open.max(close) * 1.01,
                low: open.min(close) * 0.99,
                close,
                volume: 1_000_000,
                prev_close: if i == 0 { open } else { prev },
                suspended: false,
            });
            prev = close;
            date = date.succ_opt().unwrap();
        }
        bars
    }
}
