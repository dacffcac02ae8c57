//! Bollinger breakout — buy strength through the upper band, exit on a
//! close back under the middle band.

use super::params::{resolve_f64, resolve_usize, ParamMap, ParamSpec};
use super::{close_series, Signal, Strategy, StrategyError};
use crate::domain::Bar;
use crate::indicators::bollinger;

pub struct BollingerBreakout;

impl Strategy for BollingerBreakout {
    fn id(&self) -> &'static str {
        "bollinger_breakout"
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("period", 20, 5, 250, "band lookback"),
            ParamSpec::float("band_width", 2.0, 0.5, 4.0, "stddev multiple"),
        ]
    }

    fn generate_signals(&self, bars: &[Bar], params: &ParamMap) -> Result<Vec<Signal>, StrategyError> {
        let specs = self.params();
        let period = resolve_usize(&specs, params, "period");
        let width = resolve_f64(&specs, params, "band_width");

        let closes = close_series(bars);
        let bands = bollinger(&closes, period, width);

        let mut signals = vec![Signal::NONE; bars.len()];
        for i in 1..bars.len() {
            let (upper, middle) = (bands.upper[i], bands.middle[i]);
            let (upper_prev, middle_prev) = (bands.upper[i - 1], bands.middle[i - 1]);
            if upper.is_nan() || middle.is_nan() || upper_prev.is_nan() || middle_prev.is_nan() {
                continue;
            }
            let (cur, prev) = (closes[i], closes[i - 1]);
            if prev <= upper_prev && cur > upper {
                signals[i].buy = true;
            } else if prev >= middle_prev && cur < middle {
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
    use crate::strategy::ParamValue;

    fn params(period: i64) -> ParamMap {
        let mut p = ParamMap::new();
        p.insert("period".into(), ParamValue::Integer(period));
        p
    }

    #[test]
    fn breakout_above_upper_band_buys() {
        // Quiet oscillation builds tight bands, then a surge breaks out.
        let mut closes: Vec<f64> = (0..25)
            .map(|i| 100.0 + if i % 2 == 0 { 0.2 } else { -0.2 })
            .collect();
        closes.extend([103.0, 106.0, 109.0]);
        let bars = bars_from_closes("600000", &closes);
        let signals = BollingerBreakout.generate_signals(&bars, &params(20)).unwrap();
        let first_buy = signals.iter().position(|s| s.buy);
        assert!(first_buy.is_some(), "surge should pierce the upper band");
        assert!(first_buy.unwrap() >= 25);
    }

    #[test]
    fn drop_through_middle_sells() {
        let mut closes: Vec<f64> = (0..25)
            .map(|i| 100.0 + if i % 2 == 0 { 0.2 } else { -0.2 })
            .collect();
        closes.extend([97.0, 94.0]);
        let bars = bars_from_closes("600000", &closes);
        let signals = BollingerBreakout.generate_signals(&bars, &params(20)).unwrap();
        assert!(signals.iter().any(|s| s.sell));
    }

    #[test]
    fn flat_series_is_silent() {
        // Collapsed bands: close == upper == middle; no strict crossings.
        let bars = bars_from_closes("600000", &vec![100.0; 40]);
        let signals = BollingerBreakout.generate_signals(&bars, &params(20)).unwrap();
        assert!(signals.iter().all(|s| *s == Signal::NONE));
    }
}
