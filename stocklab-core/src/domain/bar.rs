//! Bar — the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single symbol on a single trading day.
///
/// `prev_close` is the previous trading day's close and is the reference for
/// price-limit computation; on the first bar of a series it equals `open`.
/// Bars arrive in ascending trading-day order with no calendar-day gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub prev_close: f64,
    /// Trading in the symbol was halted for the whole day.
    #[serde(default)]
    pub suspended: bool,
}

impl Bar {
    /// A bar on which no trade can execute: suspended or zero volume.
    pub fn is_untradable(&self) -> bool {
        self.suspended || self.volume == 0
    }

    /// Basic OHLCV sanity check: high >= low, prices positive, prev_close positive.
    pub fn is_sane(&self) -> bool {
        if self.suspended {
            // Suspended bars may carry flat or zeroed prices; only require a
            // usable prev_close for mark-to-market carry-forward.
            return self.prev_close > 0.0;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.prev_close > 0.0
    }
}

/// Static per-symbol metadata from the data layer.
///
/// `name` drives ST detection; `ipo_date` drives the IPO price-limit
/// exception window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockInfo {
    pub symbol: String,
    pub name: String,
    pub ipo_date: Option<NaiveDate>,
    pub exchange: String,
}

impl StockInfo {
    /// Age in days since IPO as of `date`, if the IPO date is known.
    pub fn ipo_age_days(&self, date: NaiveDate) -> Option<i64> {
        self.ipo_date.map(|ipo| (date - ipo).num_days())
    }
}
