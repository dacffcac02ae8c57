//! Strategy registry — stable ids to strategy instances.

use super::bollinger_breakout::BollingerBreakout;
use super::kdj_cross::KdjCross;
use super::ma_cross::MaCross;
use super::macd_cross::MacdCross;
use super::rsi_reversion::RsiReversion;
use super::{Strategy, StrategyError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only map of registered strategies, built once at startup.
pub struct StrategyRegistry {
    strategies: BTreeMap<&'static str, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    /// The built-in strategy set.
    pub fn builtin() -> Self {
        let mut registry = Self {
            strategies: BTreeMap::new(),
        };
        registry.register(Arc::new(MaCross));
        registry.register(Arc::new(MacdCross));
        registry.register(Arc::new(RsiReversion));
        registry.register(Arc::new(BollingerBreakout));
        registry.register(Arc::new(KdjCross));
        registry
    }

    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        self.strategies.insert(strategy.id(), strategy);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Strategy>, StrategyError> {
        self.strategies
            .get(id)
            .cloned()
            .ok_or_else(|| StrategyError::UnknownStrategy(id.to_string()))
    }

    /// Registered ids in stable order.
    pub fn ids(&self) -> Vec<&'static str> {
        self.strategies.keys().copied().collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
