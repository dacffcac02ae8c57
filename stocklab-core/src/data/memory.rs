//! In-memory fixture adapter for tests and offline runs.

use super::adapter::{Adjust, AdapterError, DataAdapter};
use crate::domain::{Bar, StockInfo};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Adapter backed by pre-built bar series. Supports scripted failures so
/// selector failover paths can be exercised deterministically.
pub struct MemoryAdapter {
    name: String,
    series: BTreeMap<String, Vec<Bar>>,
    infos: BTreeMap<String, StockInfo>,
    successes_remaining: AtomicU32,
    failures_remaining: AtomicU32,
}

impl MemoryAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            series: BTreeMap::new(),
            infos: BTreeMap::new(),
            successes_remaining: AtomicU32::new(0),
            failures_remaining: AtomicU32::new(0),
        }
    }

    /// Add a bar series from `(date, open, close, volume)` tuples. High/low
    /// are derived; `prev_close` is chained automatically.
    pub fn add_series(&mut self, symbol: &str, points: Vec<(NaiveDate, f64, f64, u64)>) {
        let mut bars: Vec<Bar> = points
            .into_iter()
            .map(|(date, open, close, volume)| Bar {
                symbol: symbol.to_string(),
                date,
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume,
                prev_close: 0.0,
                suspended: false,
            })
            .collect();
        super::adapter::chain_prev_close(&mut bars);
        self.series.insert(symbol.to_string(), bars);
    }

    /// Add fully specified bars (suspensions, custom highs/lows). The caller
    /// is responsible for `prev_close` chaining.
    pub fn add_bars(&mut self, symbol: &str, bars: Vec<Bar>) {
        self.series.insert(symbol.to_string(), bars);
    }

    pub fn add_info(&mut self, info: StockInfo) {
        self.infos.insert(info.symbol.clone(), info);
    }

    /// Script the next `n` requests to fail with a network error.
    pub fn fail_next(&self, n: u32) {
        self.successes_remaining.store(0, Ordering::SeqCst);
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Script `successes` answered requests followed by `failures` network
    /// errors.
    pub fn succeed_then_fail(&self, successes: u32, failures: u32) {
        self.successes_remaining.store(successes, Ordering::SeqCst);
        self.failures_remaining.store(failures, Ordering::SeqCst);
    }

    fn take_scripted_failure(&self) -> bool {
        if self
            .successes_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return false;
        }
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl DataAdapter for MemoryAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_ohlcv(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        _adjust: Adjust,
        _timeout: Duration,
    ) -> Result<Vec<Bar>, AdapterError> {
        if self.take_scripted_failure() {
            return Err(AdapterError::Network("scripted failure".into()));
        }
        let bars: Vec<Bar> = self
            .series
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && b.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bars.is_empty() {
            return Err(AdapterError::Empty {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn get_stock_info(&self, symbol: &str) -> Result<StockInfo, AdapterError> {
        if self.take_scripted_failure() {
            return Err(AdapterError::Network("scripted failure".into()));
        }
        Ok(self.infos.get(symbol).cloned().unwrap_or_else(|| StockInfo {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            ipo_date: None,
            exchange: String::new(),
        }))
    }
}
