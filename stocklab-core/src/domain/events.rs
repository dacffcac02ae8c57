//! Structured audit records attached to a run result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What category of risk event happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskEventKind {
    /// An order was rejected before or during matching.
    OrderRejected,
    /// The risk manager emitted a forced exit.
    ForcedExit,
}

/// Audit record appended to run metadata. Never fatal to a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    pub date: NaiveDate,
    pub kind: RiskEventKind,
    /// Stable reason code, e.g. `LIMIT_UP`, `SETTLEMENT_BLOCKED`, `STOP_LOSS`.
    pub subkind: String,
    pub symbol: String,
    pub detail: String,
}

impl RiskEvent {
    pub fn rejected(
        date: NaiveDate,
        subkind: impl Into<String>,
        symbol: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            date,
            kind: RiskEventKind::OrderRejected,
            subkind: subkind.into(),
            symbol: symbol.into(),
            detail: detail.into(),
        }
    }

    pub fn forced_exit(
        date: NaiveDate,
        subkind: impl Into<String>,
        symbol: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            date,
            kind: RiskEventKind::ForcedExit,
            subkind: subkind.into(),
            symbol: symbol.into(),
            detail: detail.into(),
        }
    }
}

/// One end-of-bar point on the equity curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquitySample {
    pub date: NaiveDate,
    pub equity: f64,
    pub cash: f64,
    pub position_value: f64,
}
