//! Moving average crossover — golden cross buys, death cross sells.

use super::params::{resolve, resolve_usize, ParamMap, ParamSpec, ParamValue};
use super::{close_series, Signal, SignalAnalysis, SignalStatus, Strategy, StrategyError};
use crate::domain::Bar;
use crate::indicators::{ema, sma};
use std::collections::BTreeMap;

/// Fast/slow moving average crossover.
///
/// Buys when the fast MA crosses above the slow MA, sells when it crosses
/// below. `ma_type` selects SMA or EMA for both legs.
pub struct MaCross;

impl MaCross {
    fn averages(&self, bars: &[Bar], params: &ParamMap) -> (Vec<f64>, Vec<f64>) {
        let specs = self.params();
        let fast = resolve_usize(&specs, params, "fast_period");
        let slow = resolve_usize(&specs, params, "slow_period");
        let closes = close_series(bars);
        let use_ema = matches!(
            resolve(&specs, params, "ma_type"),
            Some(ParamValue::Enum(t)) if t == "ema"
        );
        if use_ema {
            (ema(&closes, fast), ema(&closes, slow))
        } else {
            (sma(&closes, fast), sma(&closes, slow))
        }
    }
}

impl Strategy for MaCross {
    fn id(&self) -> &'static str {
        "ma_cross"
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("fast_period", 5, 1, 120, "fast moving-average window"),
            ParamSpec::integer("slow_period", 20, 2, 250, "slow moving-average window"),
            ParamSpec::enumeration("ma_type", "sma", vec!["sma", "ema"], "moving-average flavor"),
        ]
    }

    fn generate_signals(&self, bars: &[Bar], params: &ParamMap) -> Result<Vec<Signal>, StrategyError> {
        let (fast, slow) = self.averages(bars, params);
        let mut signals = vec![Signal::NONE; bars.len()];
        for i in 1..bars.len() {
            let (fc, sc, fp, sp) = (fast[i], slow[i], fast[i - 1], slow[i - 1]);
            if fc.is_nan() || sc.is_nan() || fp.is_nan() || sp.is_nan() {
                continue;
            }
            if fc > sc && fp <= sp {
                signals[i].buy = true;
            } else if fc < sc && fp >= sp {
                signals[i].sell = true;
            }
        }
        Ok(signals)
    }

    fn analyze_current_signal(
        &self,
        bars: &[Bar],
        params: &ParamMap,
    ) -> Result<SignalAnalysis, StrategyError> {
        let signals = self.generate_signals(bars, params)?;
        let (fast, slow) = self.averages(bars, params);
        let last = bars.len().saturating_sub(1);

        let mut indicators = BTreeMap::new();
        let mut proximity = 0.0;
        if let (Some(&f), Some(&s)) = (fast.get(last), slow.get(last)) {
            if !f.is_nan() && !s.is_nan() {
                indicators.insert("fast_ma".into(), f);
                indicators.insert("slow_ma".into(), s);
                // How close the two averages are, relative to the slow leg.
                if s != 0.0 {
                    proximity = (1.0 - ((f - s) / s).abs() * 20.0).clamp(0.0, 1.0);
                }
            }
        }

        let last_signal = signals.last().copied().unwrap_or(Signal::NONE);
        let status = if last_signal.sell {
            SignalStatus::Sell
        } else if last_signal.buy {
            SignalStatus::Buy
        } else {
            SignalStatus::Hold
        };
        Ok(SignalAnalysis {
            status,
            proximity: if status == SignalStatus::Hold { proximity } else { 1.0 },
            indicators,
            suggestion: match status {
                SignalStatus::Buy => "golden cross on the latest bar".into(),
                SignalStatus::Sell => "death cross on the latest bar".into(),
                SignalStatus::Hold => "no crossover on the latest bar".into(),
            },
        })
    }
}
