//! KDJ stochastic oscillator.
//!
//! RSV = (close - lowest_low(n)) / (highest_high(n) - lowest_low(n)) * 100
//! K = SMA-style smoothing of RSV (1/m1 weight), D = smoothing of K (1/m2),
//! J = 3K - 2D. K and D seed at 50. Lookback: n - 1.

#[derive(Debug, Clone)]
pub struct Kdj {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
    pub j: Vec<f64>,
}

/// KDJ over high/low/close series (conventionally n=9, m1=3, m2=3).
///
/// All three inputs must be the same length.
pub fn kdj(highs: &[f64], lows: &[f64], closes: &[f64], n: usize, m1: usize, m2: usize) -> Kdj {
    assert!(n >= 1 && m1 >= 1 && m2 >= 1, "KDJ periods must be >= 1");
    assert!(
        highs.len() == lows.len() && lows.len() == closes.len(),
        "KDJ inputs must be the same length"
    );
    let len = closes.len();
    let mut k = vec![f64::NAN; len];
    let mut d = vec![f64::NAN; len];
    let mut j = vec![f64::NAN; len];

    let mut prev_k = 50.0;
    let mut prev_d = 50.0;

    for i in 0..len {
        if i + 1 < n {
            continue;
        }
        let window = (i + 1 - n)..=i;
        let highest = highs[window.clone()].iter().cloned().fold(f64::MIN, f64::max);
        let lowest = lows[window].iter().cloned().fold(f64::MAX, f64::min);
        let range = highest - lowest;
        let rsv = if range > 0.0 {
            (closes[i] - lowest) / range * 100.0
        } else {
            50.0 // flat window
        };

        let cur_k = (rsv + (m1 as f64 - 1.0) * prev_k) / m1 as f64;
        let cur_d = (cur_k + (m2 as f64 - 1.0) * prev_d) / m2 as f64;
        k[i] = cur_k;
        d[i] = cur_d;
        j[i] = 3.0 * cur_k - 2.0 * cur_d;
        prev_k = cur_k;
        prev_d = cur_d;
    }

    Kdj { k, d, j }
}
