//! Serializable backtest configuration and its validation.

use crate::error::RunError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stocklab_core::risk::RiskConfig;
use stocklab_core::strategy::{combine::Combiner, ParamMap, StrategyRegistry};
use stocklab_core::venue::{Channel, CommissionOverrides};

/// One strategy id, or several to be merged by a combiner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrategySelection {
    Single(String),
    Multi(Vec<String>),
}

impl StrategySelection {
    pub fn ids(&self) -> Vec<&str> {
        match self {
            StrategySelection::Single(id) => vec![id.as_str()],
            StrategySelection::Multi(ids) => ids.iter().map(String::as_str).collect(),
        }
    }
}

/// Full configuration for one backtest run.
///
/// Dates are inclusive `YYYYMMDD` strings, parsed during validation so the
/// echoed config matches what the caller sent byte for byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub symbol: String,
    pub start_date: String,
    pub end_date: String,
    pub initial_capital: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_schedule_overrides: Option<CommissionOverrides>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage_bps: Option<f64>,

    pub strategy_id: StrategySelection,

    /// Required when more than one strategy id is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combiner: Option<Combiner>,

    /// Per-strategy parameter overrides, keyed by strategy id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub strategy_params: BTreeMap<String, ParamMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_config: Option<RiskConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_hint: Option<Channel>,

    /// Reserved; no RNG touches the ledger today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Parsed, checked view of a config. Produced by [`BacktestConfig::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub strategy_ids: Vec<String>,
    pub combiner: Option<Combiner>,
    pub slippage_bps: f64,
}

fn parse_yyyymmdd(field: &str, name: &str) -> Result<NaiveDate, RunError> {
    NaiveDate::parse_from_str(field, "%Y%m%d")
        .map_err(|_| RunError::InvalidConfig(format!("{name} '{field}' is not YYYYMMDD")))
}

impl BacktestConfig {
    /// Content-addressed run identity: the blake3 hash of the canonical
    /// JSON. Identical configs share a run id.
    pub fn run_id(&self) -> String {
        let json = serde_json::to_string(self).expect("config serialization cannot fail");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Check everything checkable before any bar iterates.
    pub fn validate(&self, registry: &StrategyRegistry) -> Result<ValidatedConfig, RunError> {
        if self.symbol.trim().is_empty() {
            return Err(RunError::InvalidConfig("symbol is empty".into()));
        }
        let start = parse_yyyymmdd(&self.start_date, "start_date")?;
        let end = parse_yyyymmdd(&self.end_date, "end_date")?;
        if start > end {
            return Err(RunError::InvalidConfig(format!(
                "start_date {} after end_date {}",
                self.start_date, self.end_date
            )));
        }
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(RunError::InvalidConfig(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        let slippage_bps = self.slippage_bps.unwrap_or(stocklab_core::matching::DEFAULT_SLIPPAGE_BPS);
        if !slippage_bps.is_finite() || slippage_bps < 0.0 {
            return Err(RunError::InvalidConfig(format!(
                "slippage_bps must be non-negative, got {slippage_bps}"
            )));
        }

        let ids: Vec<String> = self.strategy_ids().iter().map(|s| s.to_string()).collect();
        if ids.is_empty() {
            return Err(RunError::InvalidConfig("no strategy selected".into()));
        }
        for id in &ids {
            let strategy = registry.get(id)?;
            if let Some(params) = self.strategy_params.get(id) {
                stocklab_core::strategy::params::validate_params(&strategy.params(), params)
                    .map_err(|e| RunError::InvalidConfig(format!("strategy '{id}': {e}")))?;
            }
        }
        for configured in self.strategy_params.keys() {
            if !ids.iter().any(|id| id == configured) {
                return Err(RunError::InvalidConfig(format!(
                    "params supplied for unselected strategy '{configured}'"
                )));
            }
        }

        if ids.len() > 1 && self.combiner.is_none() {
            return Err(RunError::InvalidConfig(
                "multiple strategies require a combiner".into(),
            ));
        }
        if let Some(Combiner::Vote { k }) = &self.combiner {
            if *k == 0 || *k > ids.len() {
                return Err(RunError::InvalidConfig(format!(
                    "vote threshold {k} outside 1..={}",
                    ids.len()
                )));
            }
        }
        if let Some(Combiner::Weighted { weights, .. }) = &self.combiner {
            if weights.len() != ids.len() {
                return Err(RunError::InvalidConfig(format!(
                    "{} weights for {} strategies",
                    weights.len(),
                    ids.len()
                )));
            }
        }

        if let Some(risk) = &self.risk_config {
            risk.validate()
                .map_err(|e| RunError::InvalidConfig(e.to_string()))?;
        }

        Ok(ValidatedConfig {
            start,
            end,
            strategy_ids: ids,
            combiner: self.combiner.clone(),
            slippage_bps,
        })
    }

    fn strategy_ids(&self) -> Vec<&str> {
        self.strategy_id.ids()
    }
}
