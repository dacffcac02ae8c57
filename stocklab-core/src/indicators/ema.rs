//! Exponential moving average.
//!
//! Seeded with the SMA of the first `period` values, then smoothed with
//! alpha = 2 / (period + 1). Lookback: period - 1.

/// EMA over `values`. Indices `0..period-1` are NaN.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    assert!(period >= 1, "EMA period must be >= 1");
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if n < period {
        return result;
    }

    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = seed;

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed;
    for i in period..n {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    #[test]
    fn ema_seeds_with_sma() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let result = ema(&values, 3);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 2.0, 1e-10); // (1+2+3)/3
        // alpha = 0.5: 0.5*4 + 0.5*2 = 3
        assert_approx(result[3], 3.0, 1e-10);
    }

    #[test]
    fn ema_converges_toward_constant() {
        let values = vec![10.0; 50];
        let result = ema(&values, 5);
        assert_approx(result[49], 10.0, 1e-10);
    }

    #[test]
    fn ema_tracks_trend_above_sma() {
        // In a rising series, EMA reacts faster than SMA.
        let values: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let e = ema(&values, 5);
        let s = crate::indicators::sma(&values, 5);
        assert!(e[19] > s[19]);
    }
}
