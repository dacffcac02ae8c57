//! Round-trip extraction — pair buy fills with sell fills FIFO per symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use stocklab_core::domain::{EquitySample, Fill, OrderSide, TradeReason};

/// A completed buy→sell pair (possibly a partial slice of either fill).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTrip {
    pub symbol: String,
    pub shares: u64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub bars_held: u32,
    /// Net of all entry and exit costs, pro-rated over the paired shares.
    pub net_pnl: f64,
    pub exit_reason: TradeReason,
}

struct OpenLot {
    shares: u64,
    /// All-in cost per share (price plus pro-rated costs).
    cost_per_share: f64,
    entry_price: f64,
    entry_date: NaiveDate,
    entry_index: u32,
}

/// Pair fills into round trips, FIFO per symbol.
///
/// `equity_curve` supplies the date → bar-index mapping for holding periods.
/// Fills are already in strict `(date, index-within-day)` order.
pub fn pair_round_trips(fills: &[Fill], equity_curve: &[EquitySample]) -> Vec<RoundTrip> {
    let date_index: BTreeMap<NaiveDate, u32> = equity_curve
        .iter()
        .enumerate()
        .map(|(i, s)| (s.date, i as u32))
        .collect();
    let index_of = |date: NaiveDate| date_index.get(&date).copied().unwrap_or(0);

    let mut open: BTreeMap<String, VecDeque<OpenLot>> = BTreeMap::new();
    let mut trips = Vec::new();

    for fill in fills {
        match fill.side {
            OrderSide::Buy => {
                let cost_per_share = -fill.net_cash_delta / fill.shares as f64;
                open.entry(fill.symbol.clone()).or_default().push_back(OpenLot {
                    shares: fill.shares,
                    cost_per_share,
                    entry_price: fill.price,
                    entry_date: fill.date,
                    entry_index: index_of(fill.date),
                });
            }
            OrderSide::Sell => {
                let queue = open.entry(fill.symbol.clone()).or_default();
                let proceeds_per_share = fill.net_cash_delta / fill.shares as f64;
                let exit_index = index_of(fill.date);
                let mut remaining = fill.shares;

                while remaining > 0 {
                    let Some(lot) = queue.front_mut() else {
                        break; // sell without a matching buy: skip the excess
                    };
                    let matched = remaining.min(lot.shares);
                    trips.push(RoundTrip {
                        symbol: fill.symbol.clone(),
                        shares: matched,
                        entry_date: lot.entry_date,
                        exit_date: fill.date,
                        entry_price: lot.entry_price,
                        exit_price: fill.price,
                        bars_held: exit_index.saturating_sub(lot.entry_index),
                        net_pnl: (proceeds_per_share - lot.cost_per_share) * matched as f64,
                        exit_reason: fill.reason,
                    });
                    lot.shares -= matched;
                    remaining -= matched;
                    if lot.shares == 0 {
                        queue.pop_front();
                    }
                }
            }
        }
    }
    trips
}
