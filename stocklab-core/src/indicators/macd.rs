//! MACD — moving average convergence/divergence.
//!
//! DIF = EMA(fast) - EMA(slow); DEA = EMA(DIF, signal); histogram = DIF - DEA.
//! Lookback: slow + signal - 2.

use super::ema::ema;

#[derive(Debug, Clone)]
pub struct Macd {
    pub dif: Vec<f64>,
    pub dea: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// MACD over `closes` with the given periods (conventionally 12/26/9).
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    assert!(fast >= 1 && slow > fast, "MACD requires slow > fast >= 1");
    assert!(signal >= 1, "MACD signal period must be >= 1");
    let n = closes.len();

    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);

    let mut dif = vec![f64::NAN; n];
    for i in 0..n {
        if !fast_ema[i].is_nan() && !slow_ema[i].is_nan() {
            dif[i] = fast_ema[i] - slow_ema[i];
        }
    }

    // DEA is an EMA over the valid portion of DIF.
    let mut dea = vec![f64::NAN; n];
    let first_valid = dif.iter().position(|v| !v.is_nan());
    if let Some(start) = first_valid {
        let tail = ema(&dif[start..], signal);
        for (offset, value) in tail.into_iter().enumerate() {
            dea[start + offset] = value;
        }
    }

    let mut histogram = vec![f64::NAN; n];
    for i in 0..n {
        if !dif[i].is_nan() && !dea[i].is_nan() {
            histogram[i] = dif[i] - dea[i];
        }
    }

    Macd {
        dif,
        dea,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    #[test]
    fn macd_warmup_window() {
        let closes: Vec<f64> = (1..=60).map(|i| 100.0 + i as f64).collect();
        let m = macd(&closes, 12, 26, 9);
        // DIF valid from index 25; DEA from index 25 + 8 = 33.
        assert!(m.dif[24].is_nan());
        assert!(!m.dif[25].is_nan());
        assert!(m.dea[32].is_nan());
        assert!(!m.dea[33].is_nan());
        assert!(!m.histogram[33].is_nan());
    }

    #[test]
    fn macd_constant_series_is_zero() {
        let closes = vec![50.0; 60];
        let m = macd(&closes, 12, 26, 9);
        assert_approx(m.dif[59], 0.0, 1e-10);
        assert_approx(m.dea[59], 0.0, 1e-10);
        assert_approx(m.histogram[59], 0.0, 1e-10);
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let closes: Vec<f64> = (1..=80).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let m = macd(&closes, 12, 26, 9);
        assert!(m.dif[79] > 0.0, "fast EMA should sit above slow EMA");
    }

    #[test]
    #[should_panic(expected = "slow > fast")]
    fn macd_rejects_inverted_periods() {
        macd(&[1.0; 40], 26, 12, 9);
    }
}
