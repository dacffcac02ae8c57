//! Data adapter contract and structured error types.

use crate::domain::{Bar, StockInfo};
use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

/// Default per-fetch timeout adapters should honor.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Price adjustment convention for a fetched series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjust {
    /// Unadjusted prices.
    Raw,
    /// Forward-adjusted (前复权).
    Qfq,
    /// Backward-adjusted (后复权).
    Hfq,
}

/// Tagged failure kinds for data operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("network error: {0}")]
    Network(String),

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("no data for '{symbol}' in the requested range")]
    Empty { symbol: String },

    #[error("fetch deadline exceeded")]
    Timeout,

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
}

impl AdapterError {
    /// Empty ranges are a success for the adapter (its health is unaffected)
    /// but a failure for the request.
    pub fn is_empty(&self) -> bool {
        matches!(self, AdapterError::Empty { .. })
    }
}

/// The contract every price-feed implementation satisfies.
///
/// `get_ohlcv` must return bars in ascending date order with no duplicates,
/// `prev_close` filled for every bar after the first, and suspended days
/// marked. Implementations must be pure with respect to the arguments for a
/// given historical range.
pub trait DataAdapter: Send + Sync {
    /// Human-readable provider name; also the identity reported in run
    /// metadata.
    fn name(&self) -> &str;

    fn get_ohlcv(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        adjust: Adjust,
        timeout: Duration,
    ) -> Result<Vec<Bar>, AdapterError>;

    fn get_stock_info(&self, symbol: &str) -> Result<StockInfo, AdapterError>;
}

/// Chain `prev_close` through a date-sorted bar sequence: each bar takes the
/// prior bar's close, and the first bar takes its own open.
pub fn chain_prev_close(bars: &mut [Bar]) {
    let mut prev: Option<f64> = None;
    for bar in bars.iter_mut() {
        bar.prev_close = prev.unwrap_or(bar.open);
        if !bar.suspended && bar.close > 0.0 {
            prev = Some(bar.close);
        }
    }
}
