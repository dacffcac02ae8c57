//! Trading calendar — ground truth for "is this date a trading day".
//!
//! Backed by a pre-fetched, sorted list of trading dates per market, loaded
//! once per process. Lookups are binary searches. Dates outside the loaded
//! range are unknown and fail closed: not a trading day, no next/prev answer.

use crate::venue::Market;
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("calendar file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("calendar parse error at line {line}: {detail}")]
    Parse { line: usize, detail: String },

    #[error("no calendar loaded for market {0:?}")]
    MarketMissing(Market),
}

/// Per-market sorted trading-day lists.
#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    days: BTreeMap<Market, Vec<NaiveDate>>,
}

impl TradingCalendar {
    /// Build from explicit per-market date lists. Dates are sorted and deduped.
    pub fn from_dates(days: BTreeMap<Market, Vec<NaiveDate>>) -> Self {
        let mut days = days;
        for list in days.values_mut() {
            list.sort_unstable();
            list.dedup();
        }
        Self { days }
    }

    /// Fixture constructor: every Monday–Friday in `[start, end]` is a trading
    /// day for `market`. Real deployments load exchange calendars instead;
    /// this keeps tests and offline runs self-contained.
    pub fn weekdays(market: Market, start: NaiveDate, end: NaiveDate) -> Self {
        let mut dates = Vec::new();
        let mut d = start;
        while d <= end {
            if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
                dates.push(d);
            }
            d = d.succ_opt().expect("date overflow");
        }
        let mut days = BTreeMap::new();
        days.insert(market, dates);
        Self { days }
    }

    /// Load from a CSV file of `date,market` rows (header optional).
    /// Unknown market codes are skipped.
    pub fn from_csv(path: &Path) -> Result<Self, CalendarError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        let mut days: BTreeMap<Market, Vec<NaiveDate>> = BTreeMap::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| CalendarError::Parse {
                line: i + 1,
                detail: e.to_string(),
            })?;
            let date_field = record.get(0).unwrap_or_default().trim();
            if date_field.is_empty() || date_field.eq_ignore_ascii_case("date") {
                continue; // header or blank
            }
            let date = NaiveDate::parse_from_str(date_field, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(date_field, "%Y%m%d"))
                .map_err(|e| CalendarError::Parse {
                    line: i + 1,
                    detail: format!("bad date '{date_field}': {e}"),
                })?;
            let market = match record.get(1).unwrap_or("CN").trim() {
                "CN" | "cn" => Market::Cn,
                "HK" | "hk" => Market::Hk,
                "US" | "us" => Market::Us,
                _ => continue,
            };
            days.entry(market).or_default().push(date);
        }
        Ok(Self::from_dates(days))
    }

    fn market_days(&self, market: Market) -> &[NaiveDate] {
        self.days.get(&market).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the calendar has any data for `market`.
    pub fn has_market(&self, market: Market) -> bool {
        !self.market_days(market).is_empty()
    }

    /// True iff `date` is a known trading day. Dates outside the loaded range
    /// are unknown and answer false.
    pub fn is_trading_day(&self, market: Market, date: NaiveDate) -> bool {
        self.market_days(market).binary_search(&date).is_ok()
    }

    /// First trading day strictly after `date`, if known.
    pub fn next_trading_day(&self, market: Market, date: NaiveDate) -> Option<NaiveDate> {
        let days = self.market_days(market);
        let idx = days.partition_point(|&d| d <= date);
        days.get(idx).copied()
    }

    /// Last trading day strictly before `date`, if known.
    pub fn prev_trading_day(&self, market: Market, date: NaiveDate) -> Option<NaiveDate> {
        let days = self.market_days(market);
        let idx = days.partition_point(|&d| d < date);
        idx.checked_sub(1).and_then(|i| days.get(i)).copied()
    }

    /// Trading days in `[start, end]`, inclusive of both bounds.
    pub fn trading_days_between(
        &self,
        market: Market,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<NaiveDate> {
        if start > end {
            return Vec::new();
        }
        let days = self.market_days(market);
        let lo = days.partition_point(|&d| d < start);
        let hi = days.partition_point(|&d| d <= end);
        days[lo..hi].to_vec()
    }

    /// Count of trading days in `[start, end]`, inclusive.
    pub fn count_trading_days(&self, market: Market, start: NaiveDate, end: NaiveDate) -> usize {
        if start > end {
            return 0;
        }
        let days = self.market_days(market);
        let lo = days.partition_point(|&d| d < start);
        let hi = days.partition_point(|&d| d <= end);
        hi - lo
    }
}
