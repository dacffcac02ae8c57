//! StockLab CLI — batch driver over the runner.
//!
//! Commands:
//! - `run` — execute a backtest from a JSON config file and print the
//!   result envelope as JSON
//! - `classify` — show the (market, board) classification for a symbol
//! - `calendar` — trading-day lookups against a CSV calendar

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use stocklab_core::calendar::TradingCalendar;
use stocklab_core::data::{AdapterSelector, CsvBarAdapter, DataAdapter};
use stocklab_core::venue::{Market, SymbolClassifier};
use stocklab_runner::{run_backtest, BacktestConfig, RunEnvironment};

#[derive(Parser)]
#[command(name = "stocklab", about = "Event-driven equity backtesting")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a backtest from a JSON config file.
    Run {
        /// Path to the backtest config (JSON).
        #[arg(long)]
        config: PathBuf,

        /// Directory of per-symbol CSV bar files.
        #[arg(long)]
        data_dir: PathBuf,

        /// Trading-calendar CSV (`date,market` rows). Weekdays of the
        /// config range are assumed when omitted.
        #[arg(long)]
        calendar: Option<PathBuf>,

        /// Pretty-print the result envelope.
        #[arg(long)]
        pretty: bool,
    },

    /// Classify a symbol into (market, board).
    Classify {
        symbol: String,

        /// Stock name, for the ST override.
        #[arg(long)]
        name: Option<String>,
    },

    /// Query a trading calendar CSV.
    Calendar {
        /// Calendar CSV path.
        #[arg(long)]
        file: PathBuf,

        /// Market code (CN, HK, US).
        #[arg(long, default_value = "CN")]
        market: String,

        /// Date to query, YYYYMMDD.
        date: String,
    },
}

fn parse_market(code: &str) -> Result<Market> {
    match code.to_ascii_uppercase().as_str() {
        "CN" => Ok(Market::Cn),
        "HK" => Ok(Market::Hk),
        "US" => Ok(Market::Us),
        other => bail!("unknown market '{other}'"),
    }
}

fn parse_date(field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(field, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(field, "%Y-%m-%d"))
        .with_context(|| format!("'{field}' is not a date"))
}

fn cmd_run(config: PathBuf, data_dir: PathBuf, calendar: Option<PathBuf>, pretty: bool) -> Result<()> {
    let text = std::fs::read_to_string(&config)
        .with_context(|| format!("reading {}", config.display()))?;
    let config: BacktestConfig = serde_json::from_str(&text).context("parsing config JSON")?;

    let calendar = match calendar {
        Some(path) => TradingCalendar::from_csv(&path)
            .with_context(|| format!("loading calendar {}", path.display()))?,
        None => {
            let classifier = SymbolClassifier::new();
            let (market, _) = classifier.classify(&config.symbol)?;
            let start = parse_date(&config.start_date)?;
            let end = parse_date(&config.end_date)?;
            TradingCalendar::weekdays(market, start, end)
        }
    };

    let adapters: Vec<Arc<dyn DataAdapter>> =
        vec![Arc::new(CsvBarAdapter::new("csv", data_dir))];
    let env = RunEnvironment::new(calendar, AdapterSelector::new(adapters))
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    match run_backtest(&config, &env) {
        Ok(result) => {
            let json = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{json}");
            Ok(())
        }
        Err(err) => {
            let envelope = serde_json::json!({
                "error": err.kind(),
                "message": err.to_string(),
            });
            println!("{envelope}");
            std::process::exit(1);
        }
    }
}

fn cmd_classify(symbol: String, name: Option<String>) -> Result<()> {
    let classifier = SymbolClassifier::new();
    let (market, board) = classifier.classify_with_name(&symbol, name.as_deref())?;
    println!(
        "{}",
        serde_json::json!({
            "symbol": symbol,
            "market": market.as_str(),
            "board": board.as_str(),
        })
    );
    Ok(())
}

fn cmd_calendar(file: PathBuf, market: String, date: String) -> Result<()> {
    let calendar = TradingCalendar::from_csv(&file)?;
    let market = parse_market(&market)?;
    let date = parse_date(&date)?;
    println!(
        "{}",
        serde_json::json!({
            "date": date.to_string(),
            "market": market.as_str(),
            "is_trading_day": calendar.is_trading_day(market, date),
            "next_trading_day": calendar.next_trading_day(market, date).map(|d| d.to_string()),
            "prev_trading_day": calendar.prev_trading_day(market, date).map(|d| d.to_string()),
        })
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            data_dir,
            calendar,
            pretty,
        } => cmd_run(config, data_dir, calendar, pretty),
        Command::Classify { symbol, name } => cmd_classify(symbol, name),
        Command::Calendar { file, market, date } => cmd_calendar(file, market, date),
    }
}
