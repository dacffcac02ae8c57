//! Rules registry — loads layer files once, composes rulesets on demand.
//!
//! The registry is read-only after load and safe to share across runs; the
//! composition cache is the only interior mutability and only ever inserts.

use super::classify::{Board, Channel, Market, TradingEnvironment};
use super::config::{
    parse_board_code, parse_channel_code, parse_market_code, parse_toml, read_toml, BoardConfig,
    ChannelConfig, MarketConfig, RulesError,
};
use super::ruleset::Ruleset;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Embedded default layer files: (relative name, contents).
const BUILTIN_MARKETS: &[(&str, &str)] = &[
    ("markets/cn.toml", include_str!("rules/markets/cn.toml")),
    ("markets/hk.toml", include_str!("rules/markets/hk.toml")),
    ("markets/us.toml", include_str!("rules/markets/us.toml")),
];

const BUILTIN_BOARDS: &[(&str, &str)] = &[
    ("boards/cn_main.toml", include_str!("rules/boards/cn_main.toml")),
    ("boards/cn_gem.toml", include_str!("rules/boards/cn_gem.toml")),
    ("boards/cn_star.toml", include_str!("rules/boards/cn_star.toml")),
    ("boards/cn_bse.toml", include_str!("rules/boards/cn_bse.toml")),
    ("boards/cn_st.toml", include_str!("rules/boards/cn_st.toml")),
    ("boards/hk_main.toml", include_str!("rules/boards/hk_main.toml")),
    ("boards/us_nyse.toml", include_str!("rules/boards/us_nyse.toml")),
];

const BUILTIN_CHANNELS: &[(&str, &str)] = &[
    ("channels/direct.toml", include_str!("rules/channels/direct.toml")),
    ("channels/connect.toml", include_str!("rules/channels/connect.toml")),
];

/// Registry of loaded layer configs plus a composition cache.
#[derive(Debug)]
pub struct RulesRegistry {
    markets: BTreeMap<Market, MarketConfig>,
    boards: BTreeMap<(Market, Board), BoardConfig>,
    channels: BTreeMap<Channel, ChannelConfig>,
    cache: RwLock<BTreeMap<TradingEnvironment, Arc<Ruleset>>>,
}

impl RulesRegistry {
    /// Load the embedded default rules shipped with the crate.
    pub fn builtin() -> Result<Self, RulesError> {
        let mut registry = Self::empty();
        for (file, text) in BUILTIN_MARKETS {
            registry.add_market(parse_toml(text, file)?, file)?;
        }
        for (file, text) in BUILTIN_BOARDS {
            registry.add_board(parse_toml(text, file)?, file)?;
        }
        for (file, text) in BUILTIN_CHANNELS {
            registry.add_channel(parse_toml(text, file)?, file)?;
        }
        Ok(registry)
    }

    /// Load from a directory laid out as `markets/*.toml`, `boards/*.toml`,
    /// `channels/*.toml`.
    pub fn from_dir(dir: &Path) -> Result<Self, RulesError> {
        let mut registry = Self::empty();
        for entry in sorted_toml_files(&dir.join("markets"))? {
            let cfg: MarketConfig = read_toml(&entry)?;
            registry.add_market(cfg, &entry.display().to_string())?;
        }
        for entry in sorted_toml_files(&dir.join("boards"))? {
            let cfg: BoardConfig = read_toml(&entry)?;
            registry.add_board(cfg, &entry.display().to_string())?;
        }
        for entry in sorted_toml_files(&dir.join("channels"))? {
            let cfg: ChannelConfig = read_toml(&entry)?;
            registry.add_channel(cfg, &entry.display().to_string())?;
        }
        Ok(registry)
    }

    fn empty() -> Self {
        Self {
            markets: BTreeMap::new(),
            boards: BTreeMap::new(),
            channels: BTreeMap::new(),
            cache: RwLock::new(BTreeMap::new()),
        }
    }

    fn add_market(&mut self, cfg: MarketConfig, file: &str) -> Result<(), RulesError> {
        let market = parse_market_code(&cfg.market, file)?;
        self.markets.insert(market, cfg);
        Ok(())
    }

    fn add_board(&mut self, cfg: BoardConfig, file: &str) -> Result<(), RulesError> {
        let market = parse_market_code(&cfg.market, file)?;
        let board = parse_board_code(&cfg.board, file)?;
        self.boards.insert((market, board), cfg);
        Ok(())
    }

    fn add_channel(&mut self, cfg: ChannelConfig, file: &str) -> Result<(), RulesError> {
        let channel = parse_channel_code(&cfg.channel, file)?;
        self.channels.insert(channel, cfg);
        Ok(())
    }

    /// Compose (or fetch from cache) the ruleset for an environment.
    pub fn ruleset(&self, env: TradingEnvironment) -> Result<Arc<Ruleset>, RulesError> {
        if let Some(cached) = self.cache.read().expect("rules cache poisoned").get(&env) {
            return Ok(Arc::clone(cached));
        }

        let market = self
            .markets
            .get(&env.market)
            .ok_or(RulesError::MarketMissing(env.market))?;
        let board = self
            .boards
            .get(&(env.market, env.board))
            .ok_or(RulesError::BoardMissing(env.market, env.board))?;
        let channel = self
            .channels
            .get(&env.channel)
            .ok_or(RulesError::ChannelMissing(env.channel))?;

        let composed = Arc::new(Ruleset::compose(env, market, board, channel)?);
        self.cache
            .write()
            .expect("rules cache poisoned")
            .insert(env, Arc::clone(&composed));
        Ok(composed)
    }
}

fn sorted_toml_files(dir: &Path) -> Result<Vec<std::path::PathBuf>, RulesError> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
