//! Declarative rules configuration — the three TOML layers.
//!
//! A market base file carries settlement, currency, and the commission
//! schedule. A board file carries price limits, lot size, and authorization.
//! A channel file carries applicability, additional fees, and trading-rule
//! overrides. Default layer files are embedded in the crate; `from_dir`
//! loads the same format from disk.

use super::classify::{Board, Channel, Market};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("rules file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rules parse error in {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("no market config for {0:?}")]
    MarketMissing(Market),

    #[error("no board config for {0:?}/{1:?}")]
    BoardMissing(Market, Board),

    #[error("no channel config for {0:?}")]
    ChannelMissing(Channel),

    #[error("channel {channel:?} is not applicable to market {market:?}")]
    ChannelNotApplicable { channel: Channel, market: Market },

    #[error("unknown {kind} code '{code}' in {file}")]
    UnknownCode {
        kind: &'static str,
        code: String,
        file: String,
    },
}

/// How stamp tax applies: sell side only (CN), both sides (HK), or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StampTaxSides {
    Sell,
    Both,
    #[default]
    None,
}

/// Market-layer commission schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketCommission {
    pub broker_rate: f64,
    pub min_broker_fee: f64,
    #[serde(default)]
    pub stamp_tax_rate: f64,
    #[serde(default)]
    pub stamp_tax_sides: StampTaxSides,
    #[serde(default)]
    pub transfer_fee_rate: f64,
}

/// Market base layer.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    pub market: String,
    pub settlement_period: u32,
    /// Cash availability horizon; defaults to the trading horizon.
    pub cash_settlement_period: Option<u32>,
    pub currency: String,
    pub money_decimals: u32,
    /// Informational at daily resolution.
    pub trading_hours: String,
    pub commission: MarketCommission,
}

/// Percent limits relative to prev_close.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LimitPcts {
    pub up_limit_pct: f64,
    pub down_limit_pct: f64,
}

/// IPO exception window. Absent pct fields mean "no limit" during the window.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IpoException {
    pub first_n_days: u32,
    pub up_limit_pct: Option<f64>,
    pub down_limit_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceLimitsConfig {
    pub default: Option<LimitPcts>,
    pub ipo_exception: Option<IpoException>,
}

/// Board layer.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    pub market: String,
    pub board: String,
    #[serde(default)]
    pub stock_code_pattern: String,
    #[serde(default)]
    pub authorization_required: bool,
    pub lot_size: u64,
    #[serde(default)]
    pub price_limits: PriceLimitsConfig,
}

/// Channel additional fees.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ChannelFees {
    #[serde(default)]
    pub currency_conversion_rate: f64,
    #[serde(default)]
    pub settlement_fee_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ChannelCommission {
    #[serde(default)]
    pub additional: ChannelFees,
}

/// Channel trading-rule overrides.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ChannelOverrides {
    pub settlement_period: Option<u32>,
    pub cash_settlement_period: Option<u32>,
    pub lot_size: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ChannelTradingRules {
    #[serde(default)]
    pub overrides: ChannelOverrides,
}

/// Channel layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub channel: String,
    pub applicable_markets: Vec<String>,
    #[serde(default)]
    pub commission: ChannelCommission,
    #[serde(default)]
    pub trading_rules: ChannelTradingRules,
}

pub(crate) fn parse_market_code(code: &str, file: &str) -> Result<Market, RulesError> {
    match code {
        "CN" => Ok(Market::Cn),
        "HK" => Ok(Market::Hk),
        "US" => Ok(Market::Us),
        _ => Err(RulesError::UnknownCode {
            kind: "market",
            code: code.to_string(),
            file: file.to_string(),
        }),
    }
}

pub(crate) fn parse_board_code(code: &str, file: &str) -> Result<Board, RulesError> {
    match code {
        "MAIN" => Ok(Board::Main),
        "GEM" => Ok(Board::Gem),
        "STAR" => Ok(Board::Star),
        "BSE" => Ok(Board::Bse),
        "ST" => Ok(Board::St),
        "NYSE" => Ok(Board::Nyse),
        _ => Err(RulesError::UnknownCode {
            kind: "board",
            code: code.to_string(),
            file: file.to_string(),
        }),
    }
}

pub(crate) fn parse_channel_code(code: &str, file: &str) -> Result<Channel, RulesError> {
    match code {
        "DIRECT" => Ok(Channel::Direct),
        "CONNECT" => Ok(Channel::Connect),
        _ => Err(RulesError::UnknownCode {
            kind: "channel",
            code: code.to_string(),
            file: file.to_string(),
        }),
    }
}

pub(crate) fn parse_toml<T: serde::de::DeserializeOwned>(
    text: &str,
    file: &str,
) -> Result<T, RulesError> {
    toml::from_str(text).map_err(|source| RulesError::Parse {
        file: file.to_string(),
        source,
    })
}

pub(crate) fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, RulesError> {
    let text = fs::read_to_string(path)?;
    parse_toml(&text, &path.display().to_string())
}
