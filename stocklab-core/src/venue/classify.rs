//! Symbol classification — infer (market, board) from a symbol string.
//!
//! Classification is an ordered pattern match; the first matching pattern
//! wins. More specific code ranges (STAR 688, GEM 300/301, BSE 43/83/87) are
//! tried before the catch-all Shanghai `6xxxxx` range so they stay reachable.
//! An optional stock-name lookup overrides the board to ST for `ST` / `*ST`
//! names. Classification is pure and deterministic.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Cn,
    Hk,
    Us,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Cn => "CN",
            Market::Hk => "HK",
            Market::Us => "US",
        }
    }
}

/// Sub-venue within a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Board {
    Main,
    Gem,
    Star,
    Bse,
    /// Special-treatment stocks; a name-based override of the code-based board.
    St,
    Nyse,
}

impl Board {
    pub fn as_str(&self) -> &'static str {
        match self {
            Board::Main => "MAIN",
            Board::Gem => "GEM",
            Board::Star => "STAR",
            Board::Bse => "BSE",
            Board::St => "ST",
            Board::Nyse => "NYSE",
        }
    }
}

/// Access path to a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    Direct,
    /// Stock Connect (southbound access to HK).
    Connect,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Direct => "DIRECT",
            Channel::Connect => "CONNECT",
        }
    }
}

/// Stable identifier for a composed ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TradingEnvironment {
    pub market: Market,
    pub board: Board,
    pub channel: Channel,
}

impl TradingEnvironment {
    pub fn new(market: Market, board: Board, channel: Channel) -> Self {
        Self {
            market,
            board,
            channel,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("unknown symbol format: '{0}'")]
    UnknownSymbol(String),
}

/// One entry in the ordered pattern table.
struct PatternRule {
    pattern: Regex,
    market: Market,
    board: Board,
}

/// Compiled ordered pattern table. Build once at startup and share.
pub struct SymbolClassifier {
    rules: Vec<PatternRule>,
}

impl SymbolClassifier {
    pub fn new() -> Self {
        let table: &[(&str, Market, Board)] = &[
            (r"^688\d{3}$", Market::Cn, Board::Star),
            (r"^30[01]\d{3}$", Market::Cn, Board::Gem),
            (r"^(43|83|87)\d{4}$", Market::Cn, Board::Bse),
            (r"^6\d{5}$", Market::Cn, Board::Main),
            (r"^(000|001)\d{3}$", Market::Cn, Board::Main),
            (r"^\d{5}(\.HK)?$", Market::Hk, Board::Main),
            (r"^[A-Za-z][A-Za-z.\-]*$", Market::Us, Board::Nyse),
        ];
        let rules = table
            .iter()
            .map(|(pat, market, board)| PatternRule {
                pattern: Regex::new(pat).expect("classifier pattern must compile"),
                market: *market,
                board: *board,
            })
            .collect();
        Self { rules }
    }

    /// Classify a bare symbol into (market, board).
    pub fn classify(&self, symbol: &str) -> Result<(Market, Board), ClassifyError> {
        let trimmed = symbol.trim();
        for rule in &self.rules {
            if rule.pattern.is_match(trimmed) {
                return Ok((rule.market, rule.board));
            }
        }
        Err(ClassifyError::UnknownSymbol(symbol.to_string()))
    }

    /// Classify with an optional stock name; `ST` / `*ST` names override the
    /// board to `St` on CN markets.
    pub fn classify_with_name(
        &self,
        symbol: &str,
        name: Option<&str>,
    ) -> Result<(Market, Board), ClassifyError> {
        let (market, board) = self.classify(symbol)?;
        if market == Market::Cn {
            if let Some(name) = name {
                let name = name.trim();
                if name.starts_with("ST") || name.starts_with("*ST") {
                    return Ok((market, Board::St));
                }
            }
        }
        Ok((market, board))
    }

    /// Full environment: classification plus a channel hint (defaults to
    /// DIRECT when no hint is given).
    pub fn environment(
        &self,
        symbol: &str,
        name: Option<&str>,
        channel_hint: Option<Channel>,
    ) -> Result<TradingEnvironment, ClassifyError> {
        let (market, board) = self.classify_with_name(symbol, name)?;
        let channel = channel_hint.unwrap_or(Channel::Direct);
        Ok(TradingEnvironment::new(market, board, channel))
    }
}

impl Default for SymbolClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> SymbolClassifier {
        SymbolClassifier::new()
    }

    #[test]
    fn shanghai_main_board() {
        assert_eq!(classifier().classify("600000"), Ok((Market::Cn, Board::Main)));
        assert_eq!(classifier().classify("601398"), Ok((Market::Cn, Board::Main)));
    }

    #[test]
    fn shenzhen_main_board() {
        assert_eq!(classifier().classify("000001"), Ok((Market::Cn, Board::Main)));
        assert_eq!(classifier().classify("001979"), Ok((Market::Cn, Board::Main)));
    }

    #[test]
    fn gem_board() {
        assert_eq!(classifier().classify("300750"), Ok((Market::Cn, Board::Gem)));
        assert_eq!(classifier().classify("301236"), Ok((Market::Cn, Board::Gem)));
    }

    #[test]
    fn star_board_beats_shanghai_prefix() {
        // 688xxx is inside the 6xxxxx range; the more specific STAR pattern
        // must win.
        assert_eq!(classifier().classify("688001"), Ok((Market::Cn, Board::Star)));
    }

    #[test]
    fn bse_board() {
        assert_eq!(classifier().classify("430047"), Ok((Market::Cn, Board::Bse)));
        assert_eq!(classifier().classify("832000"), Ok((Market::Cn, Board::Bse)));
        assert_eq!(classifier().classify("870001"), Ok((Market::Cn, Board::Bse)));
    }

    #[test]
    fn hk_with_and_without_suffix() {
        assert_eq!(classifier().classify("00700"), Ok((Market::Hk, Board::Main)));
        assert_eq!(classifier().classify("00700.HK"), Ok((Market::Hk, Board::Main)));
    }

    #[test]
    fn us_alphabetic() {
        assert_eq!(classifier().classify("AAPL"), Ok((Market::Us, Board::Nyse)));
        assert_eq!(classifier().classify("BRK.B"), Ok((Market::Us, Board::Nyse)));
    }

    #[test]
    fn unknown_symbol_rejected() {
        assert!(matches!(
            classifier().classify("12"),
            Err(ClassifyError::UnknownSymbol(_))
        ));
        assert!(classifier().classify("6000001").is_err()); // 7 digits
        assert!(classifier().classify("").is_err());
    }

    #[test]
    fn st_name_overrides_board() {
        let c = classifier();
        assert_eq!(
            c.classify_with_name("600000", Some("ST海航")),
            Ok((Market::Cn, Board::St))
        );
        assert_eq!(
            c.classify_with_name("600000", Some("*ST大集")),
            Ok((Market::Cn, Board::St))
        );
        assert_eq!(
            c.classify_with_name("600000", Some("浦发银行")),
            Ok((Market::Cn, Board::Main))
        );
    }

    #[test]
    fn st_override_ignored_outside_cn() {
        let c = classifier();
        assert_eq!(
            c.classify_with_name("00700", Some("ST something")),
            Ok((Market::Hk, Board::Main))
        );
    }

    #[test]
    fn environment_defaults_to_direct() {
        let env = classifier().environment("600000", None, None).unwrap();
        assert_eq!(env.channel, Channel::Direct);
        let env = classifier()
            .environment("00700", None, Some(Channel::Connect))
            .unwrap();
        assert_eq!(env.channel, Channel::Connect);
    }

    #[test]
    fn classification_is_deterministic() {
        let c = classifier();
        for _ in 0..3 {
            assert_eq!(c.classify("688001"), Ok((Market::Cn, Board::Star)));
        }
    }
}
