//! The stable result envelope consumed by surrounding code.

use crate::config::BacktestConfig;
use crate::metrics::MetricsReport;
use serde::{Deserialize, Serialize};
use stocklab_core::domain::{EquitySample, Fill, RiskEvent};

/// Run provenance and diagnostics. `execution_time_ms` is the only
/// wall-clock-dependent field anywhere in the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub execution_time_ms: u64,
    pub adapter_used: String,
    pub adapter_switched_during_run: bool,
    pub cancelled: bool,
}

/// Final assembly for one run. The JSON shape is stable across versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub engine_version: String,
    pub config_echo: BacktestConfig,
    pub metrics: MetricsReport,
    pub fills: Vec<Fill>,
    pub equity_curve: Vec<EquitySample>,
    pub risk_events: Vec<RiskEvent>,
    pub metadata: RunMetadata,
}
