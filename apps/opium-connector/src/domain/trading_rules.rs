//! Per-instrument trading rules and order quantization.
//!
//! Rules are immutable once constructed; each refresh cycle replaces the
//! whole rule table rather than mutating entries in place.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::TradingPair;

/// Trading constraints for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingRule {
    /// Instrument this rule applies to.
    pub trading_pair: TradingPair,
    /// Minimum price increment (tick size).
    pub min_price_increment: Decimal,
    /// Minimum base amount increment (lot size).
    pub min_base_amount_increment: Decimal,
    /// Minimum order size in base units.
    pub min_order_size: Decimal,
    /// Whether the venue accepts market orders for this instrument.
    pub supports_market_orders: bool,
}

impl TradingRule {
    /// Build a rule from the venue's decimal-precision instrument fields.
    ///
    /// A price precision of 2 means a 0.01 increment. Opium only accepts
    /// limit-type orders, so `supports_market_orders` is always false here.
    #[must_use]
    pub fn from_precision(
        trading_pair: TradingPair,
        price_decimals: u32,
        quantity_decimals: u32,
    ) -> Self {
        let price_step = step_from_decimals(price_decimals);
        let quantity_step = step_from_decimals(quantity_decimals);
        Self {
            trading_pair,
            min_price_increment: price_step,
            min_base_amount_increment: quantity_step,
            min_order_size: quantity_step,
            supports_market_orders: false,
        }
    }

    /// Floor a price to this instrument's tick size.
    #[must_use]
    pub fn quantize_price(&self, price: Decimal) -> Decimal {
        quantize_floor(price, self.min_price_increment)
    }

    /// Floor an amount to this instrument's lot size.
    #[must_use]
    pub fn quantize_amount(&self, amount: Decimal) -> Decimal {
        quantize_floor(amount, self.min_base_amount_increment)
    }
}

/// 10^-decimals as a `Decimal` step.
fn step_from_decimals(decimals: u32) -> Decimal {
    Decimal::new(1, decimals)
}

/// Floor `value` to a multiple of `step`.
fn quantize_floor(value: Decimal, step: Decimal) -> Decimal {
    if step.is_zero() {
        return value;
    }
    (value / step).floor() * step
}
