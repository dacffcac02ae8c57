//! The composed ruleset — the narrow contract downstream components consume.
//!
//! A `Ruleset` is immutable after composition. It answers order-side
//! validation, price limits, commission, settlement horizons, and lot size
//! for one (market, board, channel) environment.

use super::classify::{Market, TradingEnvironment};
use super::config::{
    BoardConfig, ChannelConfig, MarketConfig, RulesError, StampTaxSides,
};
use crate::domain::{Bar, Order, OrderSide, Portfolio};
use serde::Serialize;
use thiserror::Error;

/// Round half-away-from-zero to `decimals` places. Used for every money
/// amount so ledgers are exact to the market-currency minor unit.
pub fn round_money(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    let rounded = if scaled >= 0.0 {
        (scaled + 0.5).floor()
    } else {
        (scaled - 0.5).ceil()
    };
    rounded / factor
}

/// Price limits for one bar. Absent fields mean "no bound".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceLimits {
    pub upper: Option<f64>,
    pub lower: Option<f64>,
}

impl PriceLimits {
    pub const NONE: PriceLimits = PriceLimits {
        upper: None,
        lower: None,
    };
}

/// Itemized commission for one fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CommissionBreakdown {
    pub broker: f64,
    pub stamp_tax: f64,
    pub transfer_fee: f64,
    pub channel_fee: f64,
    pub total: f64,
}

impl CommissionBreakdown {
    pub const ZERO: CommissionBreakdown = CommissionBreakdown {
        broker: 0.0,
        stamp_tax: 0.0,
        transfer_fee: 0.0,
        channel_fee: 0.0,
        total: 0.0,
    };
}

/// Caller-supplied commission overrides, applied on top of a composed
/// ruleset (e.g. a broker negotiating away the minimum fee).
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Deserialize, Serialize)]
pub struct CommissionOverrides {
    pub broker_rate: Option<f64>,
    pub min_broker_fee: Option<f64>,
    pub stamp_tax_rate: Option<f64>,
    pub transfer_fee_rate: Option<f64>,
}

impl CommissionOverrides {
    /// Overrides that zero out every fee; used to measure friction-free runs.
    pub fn zero() -> Self {
        Self {
            broker_rate: Some(0.0),
            min_broker_fee: Some(0.0),
            stamp_tax_rate: Some(0.0),
            transfer_fee_rate: Some(0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Context the engine supplies for order-side validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderCheckContext {
    /// Whether the account is authorized for boards that require it.
    pub board_authorized: bool,
    /// Trading days elapsed since the position's latest acquisition
    /// (0 = same day). None when there is no position.
    pub trading_days_since_acquired: Option<u32>,
}

/// Order-side rejection, with a stable wire code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderRejection {
    #[error("symbol is suspended or has no volume")]
    Suspended,

    #[error("board requires authorization the account does not have")]
    Unauthorized,

    #[error("order is below one lot ({lot_size} shares)")]
    LotTooSmall { lot_size: u64 },

    #[error("position acquired {days_held} trading day(s) ago; settlement horizon is T+{horizon}")]
    SettlementBlocked { days_held: u32, horizon: u32 },
}

impl OrderRejection {
    pub fn code(&self) -> &'static str {
        match self {
            OrderRejection::Suspended => "SUSPENDED",
            OrderRejection::Unauthorized => "UNAUTHORIZED",
            OrderRejection::LotTooSmall { .. } => "LOT_TOO_SMALL",
            OrderRejection::SettlementBlocked { .. } => "SETTLEMENT_BLOCKED",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LimitPolicy {
    up_pct: f64,
    down_pct: f64,
    ipo_first_n_days: u32,
    ipo_up_pct: Option<f64>,
    ipo_down_pct: Option<f64>,
    ipo_window_unlimited: bool,
}

#[derive(Debug, Clone, Copy)]
struct CommissionSchedule {
    broker_rate: f64,
    min_broker_fee: f64,
    stamp_tax_rate: f64,
    stamp_tax_sides: StampTaxSides,
    transfer_fee_rate: f64,
    channel_conversion_rate: f64,
    channel_settlement_rate: f64,
}

/// The composed, immutable rules object for one trading environment.
#[derive(Debug, Clone)]
pub struct Ruleset {
    env: TradingEnvironment,
    currency: String,
    money_decimals: u32,
    lot_size: u64,
    settlement_period: u32,
    cash_settlement_period: u32,
    authorization_required: bool,
    limits: Option<LimitPolicy>,
    commission: CommissionSchedule,
}

impl Ruleset {
    /// Compose the three layers. The channel must be applicable to the
    /// market; channel overrides win over market and board values.
    pub fn compose(
        env: TradingEnvironment,
        market: &MarketConfig,
        board: &BoardConfig,
        channel: &ChannelConfig,
    ) -> Result<Self, RulesError> {
        if !channel
            .applicable_markets
            .iter()
            .any(|m| m == env.market.as_str())
        {
            return Err(RulesError::ChannelNotApplicable {
                channel: env.channel,
                market: env.market,
            });
        }

        let overrides = channel.trading_rules.overrides;
        let settlement_period = overrides
            .settlement_period
            .unwrap_or(market.settlement_period);
        let cash_settlement_period = overrides
            .cash_settlement_period
            .or(market.cash_settlement_period)
            .unwrap_or(settlement_period);
        let lot_size = overrides.lot_size.unwrap_or(board.lot_size);

        let limits = board.price_limits.default.map(|pcts| {
            let ipo = board.price_limits.ipo_exception;
            LimitPolicy {
                up_pct: pcts.up_limit_pct,
                down_pct: pcts.down_limit_pct,
                ipo_first_n_days: ipo.map_or(0, |e| e.first_n_days),
                ipo_up_pct: ipo.and_then(|e| e.up_limit_pct),
                ipo_down_pct: ipo.and_then(|e| e.down_limit_pct),
                ipo_window_unlimited: ipo
                    .is_some_and(|e| e.up_limit_pct.is_none() && e.down_limit_pct.is_none()),
            }
        });

        Ok(Self {
            env,
            currency: market.currency.clone(),
            money_decimals: market.money_decimals,
            lot_size,
            settlement_period,
            cash_settlement_period,
            authorization_required: board.authorization_required,
            limits,
            commission: CommissionSchedule {
                broker_rate: market.commission.broker_rate,
                min_broker_fee: market.commission.min_broker_fee,
                stamp_tax_rate: market.commission.stamp_tax_rate,
                stamp_tax_sides: market.commission.stamp_tax_sides,
                transfer_fee_rate: market.commission.transfer_fee_rate,
                channel_conversion_rate: channel.commission.additional.currency_conversion_rate,
                channel_settlement_rate: channel.commission.additional.settlement_fee_rate,
            },
        })
    }

    /// A copy of this ruleset with the given commission fields replaced.
    pub fn with_commission_overrides(&self, overrides: &CommissionOverrides) -> Ruleset {
        let mut copy = self.clone();
        if let Some(v) = overrides.broker_rate {
            copy.commission.broker_rate = v;
        }
        if let Some(v) = overrides.min_broker_fee {
            copy.commission.min_broker_fee = v;
        }
        if let Some(v) = overrides.stamp_tax_rate {
            copy.commission.stamp_tax_rate = v;
        }
        if let Some(v) = overrides.transfer_fee_rate {
            copy.commission.transfer_fee_rate = v;
        }
        copy
    }

    pub fn environment(&self) -> TradingEnvironment {
        self.env
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn money_decimals(&self) -> u32 {
        self.money_decimals
    }

    pub fn lot_size(&self) -> u64 {
        self.lot_size
    }

    /// Trading settlement horizon — governs sell eligibility (T+N).
    pub fn settlement_horizon(&self) -> u32 {
        self.settlement_period
    }

    /// Cash settlement horizon — informational; sale proceeds availability.
    pub fn cash_settlement_horizon(&self) -> u32 {
        self.cash_settlement_period
    }

    /// Run all layers' order-side checks.
    pub fn validate_order(
        &self,
        order: &Order,
        portfolio: &Portfolio,
        bar: &Bar,
        ctx: &OrderCheckContext,
    ) -> Result<(), OrderRejection> {
        if bar.is_untradable() {
            return Err(OrderRejection::Suspended);
        }
        if self.authorization_required && !ctx.board_authorized {
            return Err(OrderRejection::Unauthorized);
        }
        match order.side {
            OrderSide::Buy => {
                if order.shares < self.lot_size {
                    return Err(OrderRejection::LotTooSmall {
                        lot_size: self.lot_size,
                    });
                }
            }
            OrderSide::Sell => {
                // Odd lots may always be sold to close; only the settlement
                // horizon gates the sell side.
                if self.settlement_period > 0 && portfolio.has_position(&order.symbol) {
                    let days_held = ctx.trading_days_since_acquired.unwrap_or(0);
                    if days_held < self.settlement_period {
                        return Err(OrderRejection::SettlementBlocked {
                            days_held,
                            horizon: self.settlement_period,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Price limits for a bar with the given previous close.
    ///
    /// `ipo_age_days` counts days since listing (0 = listing day); `None`
    /// means the listing date is unknown, which disables the IPO exception.
    pub fn price_limits(&self, prev_close: f64, ipo_age_days: Option<i64>) -> PriceLimits {
        let Some(policy) = self.limits else {
            return PriceLimits::NONE;
        };

        let in_ipo_window = ipo_age_days
            .is_some_and(|age| age >= 0 && (age as u64) < policy.ipo_first_n_days as u64);

        let (up_pct, down_pct) = if in_ipo_window {
            if policy.ipo_window_unlimited {
                return PriceLimits::NONE;
            }
            (
                policy.ipo_up_pct.unwrap_or(policy.up_pct),
                policy.ipo_down_pct.unwrap_or(policy.down_pct),
            )
        } else {
            (policy.up_pct, policy.down_pct)
        };

        PriceLimits {
            upper: Some(round_money(prev_close * (1.0 + up_pct), self.money_decimals)),
            lower: Some(round_money(prev_close * (1.0 - down_pct), self.money_decimals)),
        }
    }

    /// Itemized commission for a fill of `gross_amount` on `symbol`.
    ///
    /// Transfer fee applies to Shanghai-listed symbols only (6xxxxx codes).
    /// Every component is rounded to the currency minor unit before summing.
    pub fn commission(
        &self,
        side: OrderSide,
        gross_amount: f64,
        symbol: &str,
    ) -> CommissionBreakdown {
        let c = &self.commission;
        let dp = self.money_decimals;

        let mut broker = gross_amount * c.broker_rate;
        if broker > 0.0 && broker < c.min_broker_fee {
            broker = c.min_broker_fee;
        } else if c.broker_rate == 0.0 && c.min_broker_fee > 0.0 {
            // Flat-fee markets: the floor is the fee.
            broker = c.min_broker_fee;
        }
        let broker = round_money(broker, dp);

        let stamp_applies = match c.stamp_tax_sides {
            StampTaxSides::Sell => side == OrderSide::Sell,
            StampTaxSides::Both => true,
            StampTaxSides::None => false,
        };
        let stamp_tax = if stamp_applies {
            round_money(gross_amount * c.stamp_tax_rate, dp)
        } else {
            0.0
        };

        let transfer_fee = if self.env.market == Market::Cn && symbol.starts_with('6') {
            round_money(gross_amount * c.transfer_fee_rate, dp)
        } else {
            0.0
        };

        let channel_fee = round_money(
            gross_amount * (c.channel_conversion_rate + c.channel_settlement_rate),
            dp,
        );

        CommissionBreakdown {
            broker,
            stamp_tax,
            transfer_fee,
            channel_fee,
            total: round_money(broker + stamp_tax + transfer_fee + channel_fee, dp),
        }
    }
}
