//! StockLab Runner — the invocation surface around the core engine.
//!
//! `run_backtest(config, env)` wires together classification, rules
//! composition, resilient data fetching, signal generation, the bar loop,
//! metrics, and the stable JSON result envelope. Independent runs may be
//! evaluated in parallel with `run_many`; each run owns disjoint mutable
//! state and shares only the read-only collaborators in `RunEnvironment`.

pub mod config;
pub mod error;
pub mod metrics;
pub mod result;
pub mod runner;
pub mod trades;

pub use config::{BacktestConfig, StrategySelection};
pub use error::RunError;
pub use metrics::MetricsReport;
pub use result::{RunMetadata, RunResult};
pub use runner::{run_backtest, run_backtest_cancellable, run_many, RunEnvironment, ENGINE_VERSION};
pub use trades::{pair_round_trips, RoundTrip};
