//! KDJ crossover — K/D golden cross in the oversold zone buys, death cross
//! in the overbought zone sells.

use super::params::{resolve_f64, resolve_usize, ParamMap, ParamSpec};
use super::{Signal, Strategy, StrategyError};
use crate::domain::Bar;
use crate::indicators::kdj;

pub struct KdjCross;

impl Strategy for KdjCross {
    fn id(&self) -> &'static str {
        "kdj_cross"
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("n", 9, 2, 120, "RSV lookback"),
            ParamSpec::integer("m1", 3, 1, 30, "K smoothing"),
            ParamSpec::integer("m2", 3, 1, 30, "D smoothing"),
            ParamSpec::float("oversold", 30.0, 1.0, 50.0, "zone gating golden crosses"),
            ParamSpec::float("overbought", 70.0, 50.0, 99.0, "zone gating death crosses"),
        ]
    }

    fn generate_signals(&self, bars: &[Bar], params: &ParamMap) -> Result<Vec<Signal>, StrategyError> {
        let specs = self.params();
        let n = resolve_usize(&specs, params, "n");
        let m1 = resolve_usize(&specs, params, "m1");
        let m2 = resolve_usize(&specs, params, "m2");
        let oversold = resolve_f64(&specs, params, "oversold");
        let overbought = resolve_f64(&specs, params, "overbought");

        let highs: Vec<f64> = bars.iter().map(|b| if b.suspended { b.prev_close } else { b.high }).collect();
        let lows: Vec<f64> = bars.iter().map(|b| if b.suspended { b.prev_close } else { b.low }).collect();
        let closes: Vec<f64> = bars.iter().map(|b| if b.suspended { b.prev_close } else { b.close }).collect();
        let out = kdj(&highs, &lows, &closes, n, m1, m2);

        let mut signals = vec![Signal::NONE; bars.len()];
        for i in 1..bars.len() {
            let (kc, dc, kp, dp) = (out.k[i], out.d[i], out.k[i - 1], out.d[i - 1]);
            if kc.is_nan() || dc.is_nan() || kp.is_nan() || dp.is_nan() {
                continue;
            }
            if kc > dc && kp <= dp && dc < oversold {
                signals[i].buy = true;
            } else if kc < dc && kp >= dp && dc > overbought {
                signals[i].sell = true;
            }
        }
        Ok(signals)
    }
}
