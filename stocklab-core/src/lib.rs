//! StockLab Core — the event-driven backtesting engine.
//!
//! This crate contains the heart of the simulator:
//! - Domain types (bars, orders, fills, positions, portfolio, risk events)
//! - Trading calendar (per-market trading-day lookups)
//! - Symbol classifier and the three-layer venue rules registry
//! - Data-adapter contract with a health-tracked failover selector
//! - Indicator functions and the strategy engine with signal combiners
//! - Matching engine (price limits, slippage, lots, commission)
//! - Risk manager (pre-trade caps, forced exits)
//! - Per-bar trading engine with cancellation support

pub mod calendar;
pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod matching;
pub mod risk;
pub mod strategy;
pub mod venue;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: all core types shared across run boundaries are Send + Sync.
    ///
    /// Runs may be evaluated in parallel; the calendar, rules registry, and
    /// adapter selector are shared read-mostly collaborators and must cross
    /// thread boundaries safely.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Order>();
        require_sync::<domain::Order>();
        require_send::<domain::Fill>();
        require_sync::<domain::Fill>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::Portfolio>();
        require_sync::<domain::Portfolio>();
        require_send::<domain::RiskEvent>();
        require_sync::<domain::RiskEvent>();
        require_send::<domain::EquitySample>();
        require_sync::<domain::EquitySample>();

        // Shared collaborators
        require_send::<calendar::TradingCalendar>();
        require_sync::<calendar::TradingCalendar>();
        require_send::<venue::SymbolClassifier>();
        require_sync::<venue::SymbolClassifier>();
        require_send::<venue::RulesRegistry>();
        require_sync::<venue::RulesRegistry>();
        require_send::<data::AdapterSelector>();
        require_sync::<data::AdapterSelector>();

        // Engine types
        require_send::<engine::EngineConfig>();
        require_sync::<engine::EngineConfig>();
        require_send::<engine::EngineOutput>();
        require_sync::<engine::EngineOutput>();
        require_send::<engine::CancelToken>();
        require_sync::<engine::CancelToken>();
        require_send::<risk::RiskManager>();
        require_sync::<risk::RiskManager>();
    }
}
