//! Bollinger bands.
//!
//! Middle = SMA(period); upper/lower = middle ± k * population stddev over
//! the same window. Lookback: period - 1.

use super::sma::sma;

#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub middle: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Bollinger bands over `closes` (conventionally period=20, k=2).
pub fn bollinger(closes: &[f64], period: usize, k: f64) -> BollingerBands {
    assert!(period >= 2, "Bollinger period must be >= 2");
    let n = closes.len();
    let middle = sma(closes, period);
    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];

    for i in (period - 1)..n {
        let window = &closes[i + 1 - period..=i];
        let mean = middle[i];
        let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        let dev = k * variance.sqrt();
        upper[i] = mean + dev;
        lower[i] = mean - dev;
    }

    BollingerBands {
        middle,
        upper,
        lower,
    }
}
