//! RSI mean reversion — buy oversold recoveries, sell overbought rollovers.

use super::params::{resolve_f64, resolve_usize, ParamMap, ParamSpec};
use super::{close_series, Signal, Strategy, StrategyError};
use crate::domain::Bar;
use crate::indicators::rsi;

/// Buys when RSI recovers up through the oversold level; sells when RSI
/// rolls over down through the overbought level. Crossing (not residing)
/// keeps the strategy from repeating the same signal every bar.
pub struct RsiReversion;

impl Strategy for RsiReversion {
    fn id(&self) -> &'static str {
        "rsi_reversion"
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("period", 14, 2, 120, "RSI lookback"),
            ParamSpec::float("oversold", 30.0, 1.0, 50.0, "oversold recovery level"),
            ParamSpec::float("overbought", 70.0, 50.0, 99.0, "overbought rollover level"),
        ]
    }

    fn generate_signals(&self, bars: &[Bar], params: &ParamMap) -> Result<Vec<Signal>, StrategyError> {
        let specs = self.params();
        let period = resolve_usize(&specs, params, "period");
        let oversold = resolve_f64(&specs, params, "oversold");
        let overbought = resolve_f64(&specs, params, "overbought");

        let closes = close_series(bars);
        let values = rsi(&closes, period);

        let mut signals = vec![Signal::NONE; bars.len()];
        for i in 1..bars.len() {
            let (cur, prev) = (values[i], values[i - 1]);
            if cur.is_nan() || prev.is_nan() {
                continue;
            }
            if prev < oversold && cur >= oversold {
                signals[i].buy = true;
            } else if prev > overbought && cur <= overbought {
                signals[i].sell = true;
            }
        }
        Ok(signals)
    }
}
