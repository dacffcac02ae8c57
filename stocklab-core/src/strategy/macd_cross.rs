//! MACD crossover — DIF crossing DEA.

use super::params::{resolve_usize, ParamMap, ParamSpec};
use super::{close_series, Signal, Strategy, StrategyError};
use crate::domain::Bar;
use crate::indicators::macd;

/// Buys when DIF crosses above DEA, sells when DIF crosses below DEA.
pub struct MacdCross;

impl Strategy for MacdCross {
    fn id(&self) -> &'static str {
        "macd_cross"
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("fast_period", 12, 2, 120, "fast EMA window"),
            ParamSpec::integer("slow_period", 26, 3, 250, "slow EMA window"),
            ParamSpec::integer("signal_period", 9, 1, 60, "DEA smoothing window"),
        ]
    }

    fn generate_signals(&self, bars: &[Bar], params: &ParamMap) -> Result<Vec<Signal>, StrategyError> {
        let specs = self.params();
        let fast = resolve_usize(&specs, params, "fast_period");
        let slow = resolve_usize(&specs, params, "slow_period");
        let signal = resolve_usize(&specs, params, "signal_period");

        let closes = close_series(bars);
        let m = macd(&closes, fast, slow, signal);

        let mut signals = vec![Signal::NONE; bars.len()];
        for i in 1..bars.len() {
            let (dc, ec, dp, ep) = (m.dif[i], m.dea[i], m.dif[i - 1], m.dea[i - 1]);
            if dc.is_nan() || ec.is_nan() || dp.is_nan() || ep.is_nan() {
                continue;
            }
            if dc > ec && dp <= ep {
                signals[i].buy = true;
            } else if dc < ec && dp >= ep {
                signals[i].sell = true;
            }
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testutil::bars_from_closes;

    #[test]
    fn v_shape_produces_buy_after_turn() {
        // Long decline then recovery: DIF crosses above DEA on the way up.
        let mut closes: Vec<f64> = (0..50).map(|i| 100.0 - i as f64 * 0.5).collect();
        closes.extend((0..30).map(|i| 75.0 + i as f64 * 1.0));
        let bars = bars_from_closes("600000", &closes);
        let signals = MacdCross.generate_signals(&bars, &ParamMap::new()).unwrap();
        let first_buy = signals.iter().position(|s| s.buy);
        assert!(first_buy.is_some(), "expected a DIF/DEA golden cross");
        assert!(first_buy.unwrap() >= 50, "buy must come after the turn");
    }

    #[test]
    fn peak_produces_sell_after_turn() {
        let mut closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64 * 0.5).collect();
        closes.extend((0..30).map(|i| 125.0 - i as f64 * 1.0));
        let bars = bars_from_closes("600000", &closes);
        let signals = MacdCross.generate_signals(&bars, &ParamMap::new()).unwrap();
        assert!(signals.iter().any(|s| s.sell));
    }

    #[test]
    fn flat_series_is_silent() {
        let bars = bars_from_closes("600000", &vec![50.0; 60]);
        let signals = MacdCross.generate_signals(&bars, &ParamMap::new()).unwrap();
        assert!(signals.iter().all(|s| *s == Signal::NONE));
    }

    #[test]
    fn no_lookahead_prefix_stability() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + ((i * 13) % 17) as f64 * 0.8)
            .collect();
        let bars = bars_from_closes("600000", &closes);
        let full = MacdCross.generate_signals(&bars, &ParamMap::new()).unwrap();
        for cut in [40, 50, 59] {
            let partial = MacdCross.generate_signals(&bars[..cut], &ParamMap::new()).unwrap();
            assert_eq!(&full[..cut], &partial[..]);
        }
    }
}
