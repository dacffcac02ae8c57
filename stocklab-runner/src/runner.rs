//! Backtest runner — wires classification, rules, data, signals, the bar
//! loop, metrics, and the result envelope together.
//!
//! Entry points:
//! - `run_backtest()`: validate and run to completion.
//! - `run_backtest_cancellable()`: same, checking a token between bars.
//! - `run_many()`: independent configs in parallel; runs share only the
//!   read-only collaborators.

use crate::config::BacktestConfig;
use crate::error::RunError;
use crate::metrics::MetricsReport;
use crate::result::{RunMetadata, RunResult};
use crate::trades::pair_round_trips;
use rayon::prelude::*;
use std::time::Instant;
use stocklab_core::calendar::TradingCalendar;
use stocklab_core::data::{Adjust, AdapterSelector};
use stocklab_core::domain::{Bar, StockInfo};
use stocklab_core::engine::{run_engine, CancelToken, EngineConfig};
use stocklab_core::risk::{RiskConfig, RiskManager};
use stocklab_core::strategy::{combine_signals, validated_signals, Signal, StrategyRegistry};
use stocklab_core::venue::{RulesRegistry, SymbolClassifier};

/// Version stamped into every result envelope.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process-wide read-mostly collaborators, initialized once at startup and
/// shared by every run. Nothing here is mutated by a run; the adapter
/// selector's health tracking has its own internal locking.
pub struct RunEnvironment {
    pub classifier: SymbolClassifier,
    pub rules: RulesRegistry,
    pub calendar: TradingCalendar,
    pub selector: AdapterSelector,
    pub strategies: StrategyRegistry,
}

impl RunEnvironment {
    pub fn new(calendar: TradingCalendar, selector: AdapterSelector) -> Result<Self, RunError> {
        Ok(Self {
            classifier: SymbolClassifier::new(),
            rules: RulesRegistry::builtin()?,
            calendar,
            selector,
            strategies: StrategyRegistry::builtin(),
        })
    }
}

/// Run one backtest to completion.
pub fn run_backtest(config: &BacktestConfig, env: &RunEnvironment) -> Result<RunResult, RunError> {
    run_backtest_cancellable(config, env, &CancelToken::new())
}

/// Run one backtest, checking `cancel` between bars. Cancellation after the
/// run has started produces a partial result flagged in metadata; before it
/// starts, a `CANCELLED` error.
pub fn run_backtest_cancellable(
    config: &BacktestConfig,
    env: &RunEnvironment,
    cancel: &CancelToken,
) -> Result<RunResult, RunError> {
    let started = Instant::now();

    // Configuration and classification errors surface before any bar.
    let validated = config.validate(&env.strategies)?;
    if cancel.is_cancelled() {
        return Err(RunError::Cancelled);
    }

    // One adapter session per run: sticky, with forced switches recorded.
    let session = env.selector.session();

    // Stock info drives ST board overrides and the IPO limit window. A feed
    // that cannot answer degrades to code-only classification.
    let stock_info = session
        .get_stock_info(&config.symbol)
        .unwrap_or_else(|_| StockInfo {
            symbol: config.symbol.clone(),
            name: config.symbol.clone(),
            ipo_date: None,
            exchange: String::new(),
        });

    let trading_env = env.classifier.environment(
        &config.symbol,
        Some(&stock_info.name),
        config.channel_hint,
    )?;

    let mut ruleset = env.rules.ruleset(trading_env)?.as_ref().clone();
    if let Some(overrides) = &config.commission_schedule_overrides {
        ruleset = ruleset.with_commission_overrides(overrides);
    }

    let mut bars = session.get_ohlcv(&config.symbol, validated.start, validated.end, Adjust::Qfq)?;
    restrict_to_trading_days(&mut bars, &env.calendar, trading_env.market);
    if bars.is_empty() {
        return Err(RunError::NoData {
            symbol: config.symbol.clone(),
        });
    }

    // Signals over the full history, once per run; combined when several
    // strategies are selected.
    let empty_params = stocklab_core::strategy::ParamMap::new();
    let mut streams = Vec::with_capacity(validated.strategy_ids.len());
    for id in &validated.strategy_ids {
        let strategy = env.strategies.get(id)?;
        let params = config.strategy_params.get(id).unwrap_or(&empty_params);
        streams.push(validated_signals(strategy.as_ref(), &bars, params)?);
    }
    let signals: Vec<Signal> = match &validated.combiner {
        Some(combiner) if streams.len() > 1 => combine_signals(&streams, combiner)
            .map_err(|e| RunError::InvalidConfig(e.to_string()))?,
        _ => streams.into_iter().next().expect("at least one stream"),
    };

    let risk_config = config.risk_config.clone().unwrap_or(RiskConfig::default());
    let mut risk = RiskManager::new(risk_config, config.initial_capital);
    let engine_config = EngineConfig {
        initial_capital: config.initial_capital,
        slippage_bps: validated.slippage_bps,
        board_authorized: true,
    };

    let output = run_engine(
        &bars,
        &signals,
        &stock_info,
        &ruleset,
        &engine_config,
        &mut risk,
        cancel,
    )?;

    let trades = pair_round_trips(&output.fills, &output.equity_curve);
    let metrics = MetricsReport::compute(&output.equity_curve, &output.fills, &trades, 0.0);

    Ok(RunResult {
        run_id: config.run_id(),
        engine_version: ENGINE_VERSION.to_string(),
        config_echo: config.clone(),
        metrics,
        fills: output.fills,
        equity_curve: output.equity_curve,
        risk_events: output.risk_events,
        metadata: RunMetadata {
            execution_time_ms: started.elapsed().as_millis() as u64,
            adapter_used: session.adapter_used().unwrap_or_else(|| "none".to_string()),
            adapter_switched_during_run: session.switched_during_run(),
            cancelled: output.cancelled,
        },
    })
}

/// Evaluate independent configs in parallel. Each run owns its portfolio,
/// risk manager, and bar sequence; only the environment is shared.
pub fn run_many(
    configs: &[BacktestConfig],
    env: &RunEnvironment,
) -> Vec<Result<RunResult, RunError>> {
    configs
        .par_iter()
        .map(|config| run_backtest(config, env))
        .collect()
}

/// Drop bars the calendar does not recognize as trading days. A calendar
/// without data for the market leaves the feed untouched (fail open here;
/// the engine never consults the calendar directly).
fn restrict_to_trading_days(bars: &mut Vec<Bar>, calendar: &TradingCalendar, market: stocklab_core::venue::Market) {
    if calendar.has_market(market) {
        bars.retain(|b| calendar.is_trading_day(market, b.date));
    }
}
