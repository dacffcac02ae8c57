//! Signal combiners — merge several strategies' signal streams into one.
//!
//! After combination, a bar asserting both buy and sell resolves to sell
//! (risk-first policy), so the engine never sees an ambiguous pair.

use super::Signal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How multiple strategies' signals are merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Combiner {
    /// Buy iff all components buy; sell iff any component sells.
    And,
    /// Buy iff any component buys; sell iff all components sell.
    Or,
    /// Buy iff at least `k` components buy; sell mirrored.
    Vote { k: usize },
    /// Weighted sum of boolean signals compared against a threshold.
    Weighted { weights: Vec<f64>, threshold: f64 },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CombineError {
    #[error("no signal streams to combine")]
    Empty,

    #[error("signal streams have different lengths")]
    LengthMismatch,

    #[error("vote threshold {k} exceeds the {n} component strategies")]
    VoteOutOfRange { k: usize, n: usize },

    #[error("{weights} weights supplied for {n} component strategies")]
    WeightCountMismatch { weights: usize, n: usize },
}

/// Merge the per-strategy signal streams into a single stream.
pub fn combine_signals(streams: &[Vec<Signal>], combiner: &Combiner) -> Result<Vec<Signal>, CombineError> {
    let n = streams.len();
    if n == 0 {
        return Err(CombineError::Empty);
    }
    let len = streams[0].len();
    if streams.iter().any(|s| s.len() != len) {
        return Err(CombineError::LengthMismatch);
    }
    match combiner {
        Combiner::Vote { k } if *k == 0 || *k > n => {
            return Err(CombineError::VoteOutOfRange { k: *k, n });
        }
        Combiner::Weighted { weights, .. } if weights.len() != n => {
            return Err(CombineError::WeightCountMismatch {
                weights: weights.len(),
                n,
            });
        }
        _ => {}
    }

    let mut combined = Vec::with_capacity(len);
    for i in 0..len {
        let buys = streams.iter().filter(|s| s[i].buy).count();
        let sells = streams.iter().filter(|s| s[i].sell).count();

        let (buy, sell) = match combiner {
            Combiner::And => (buys == n, sells > 0),
            Combiner::Or => (buys > 0, sells == n),
            Combiner::Vote { k } => (buys >= *k, sells >= *k),
            Combiner::Weighted { weights, threshold } => {
                let buy_score: f64 = streams
                    .iter()
                    .zip(weights)
                    .filter(|(s, _)| s[i].buy)
                    .map(|(_, w)| w)
                    .sum();
                let sell_score: f64 = streams
                    .iter()
                    .zip(weights)
                    .filter(|(s, _)| s[i].sell)
                    .map(|(_, w)| w)
                    .sum();
                (buy_score >= *threshold, sell_score >= *threshold)
            }
        };

        // Risk-first tie-break: sell wins when both fire.
        combined.push(if buy && sell {
            Signal::sell()
        } else {
            Signal { buy, sell }
        });
    }
    Ok(combined)
}
