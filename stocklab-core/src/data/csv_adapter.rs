//! CSV-file data adapter — one file per symbol under a data directory.
//!
//! File format: `date,open,high,low,close,volume[,suspended]` with a header
//! row. Dates are `YYYY-MM-DD` or `YYYYMMDD`. `prev_close` is chained after
//! load. Stock metadata is read from an optional `info.csv`
//! (`symbol,name,ipo_date,exchange`).

use super::adapter::{chain_prev_close, Adjust, AdapterError, DataAdapter};
use crate::domain::{Bar, StockInfo};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;

pub struct CsvBarAdapter {
    name: String,
    dir: PathBuf,
}

impl CsvBarAdapter {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }

    fn parse_date(field: &str) -> Result<NaiveDate, AdapterError> {
        NaiveDate::parse_from_str(field, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(field, "%Y%m%d"))
            .map_err(|e| AdapterError::Parse(format!("bad date '{field}': {e}")))
    }

    fn parse_f64(field: &str, column: &str) -> Result<f64, AdapterError> {
        field
            .trim()
            .parse()
            .map_err(|e| AdapterError::Parse(format!("bad {column} '{field}': {e}")))
    }
}

impl DataAdapter for CsvBarAdapter {
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
        let path = self.dir.join(format!("{symbol}.csv"));
        if !path.exists() {
            return Err(AdapterError::SymbolNotFound(symbol.to_string()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&path)
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        let mut bars = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| AdapterError::Parse(e.to_string()))?;
            let get = |i: usize| record.get(i).unwrap_or_default();
            let bar = Bar {
                symbol: symbol.to_string(),
                date: Self::parse_date(get(0).trim())?,
                open: Self::parse_f64(get(1), "open")?,
                high: Self::parse_f64(get(2), "high")?,
                low: Self::parse_f64(get(3), "low")?,
                close: Self::parse_f64(get(4), "close")?,
                volume: get(5)
                    .trim()
                    .parse()
                    .map_err(|e| AdapterError::Parse(format!("bad volume: {e}")))?,
                prev_close: 0.0,
                suspended: matches!(get(6).trim(), "1" | "true" | "TRUE"),
            };
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        chain_prev_close(&mut bars);
        bars.retain(|b| b.date >= start && b.date <= end);

        if bars.is_empty() {
            return Err(AdapterError::Empty {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn get_stock_info(&self, symbol: &str) -> Result<StockInfo, AdapterError> {
        let path = self.dir.join("info.csv");
        if path.exists() {
            let mut reader = csv::ReaderBuilder::new()
                .flexible(true)
                .from_path(&path)
                .map_err(|e| AdapterError::Network(e.to_string()))?;
            for record in reader.records() {
                let record = record.map_err(|e| AdapterError::Parse(e.to_string()))?;
                if record.get(0).unwrap_or_default().trim() == symbol {
                    let ipo = record.get(2).unwrap_or_default().trim();
                    return Ok(StockInfo {
                        symbol: symbol.to_string(),
                        name: record.get(1).unwrap_or_default().trim().to_string(),
                        ipo_date: if ipo.is_empty() {
                            None
                        } else {
                            Some(Self::parse_date(ipo)?)
                        },
                        exchange: record.get(3).unwrap_or_default().trim().to_string(),
                    });
                }
            }
        }
        Ok(StockInfo {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            ipo_date: None,
            exchange: String::new(),
        })
    }
}
