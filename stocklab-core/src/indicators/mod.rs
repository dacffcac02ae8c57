//! Technical indicators — pure per-series transforms.
//!
//! Every function takes a slice of values (or bars) and returns a vector of
//! the same length, with `NaN` for indices inside the warmup window. Nothing
//! here reads future values: position `i` of any output depends only on
//! inputs `0..=i`.

pub mod bollinger;
pub mod ema;
pub mod kdj;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::{bollinger, BollingerBands};
pub use ema::ema;
pub use kdj::{kdj, Kdj};
pub use macd::{macd, Macd};
pub use rsi::rsi;
pub use sma::sma;

#[cfg(test)]
pub(crate) fn assert_approx(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() < tol,
        "expected {expected}, got {actual}"
    );
}
