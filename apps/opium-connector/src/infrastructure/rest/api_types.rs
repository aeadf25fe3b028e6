//! Wire types for the Opium REST API.
//!
//! Decoded at the boundary; everything past the adapter works with the
//! typed domain/port structures instead of raw JSON.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{BalanceEntry, OrderStatusReport, TradeReport};
use crate::domain::order_tracking::OrderStatus;
use crate::domain::shared::{ExchangeOrderId, TradeId, TradingPair};
use crate::domain::trading_rules::TradingRule;

/// One instrument from the instruments listing.
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentPayload {
    /// Venue instrument name.
    pub instrument_name: String,
    /// Decimal places of the price grid.
    pub price_decimals: u32,
    /// Decimal places of the quantity grid.
    pub quantity_decimals: u32,
}

/// Instruments listing response.
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentsResponse {
    /// Listed instruments.
    pub instruments: Vec<InstrumentPayload>,
}

impl InstrumentPayload {
    /// Convert into a trading rule.
    #[must_use]
    pub fn into_trading_rule(self) -> TradingRule {
        TradingRule::from_precision(
            TradingPair::new(self.instrument_name),
            self.price_decimals,
            self.quantity_decimals,
        )
    }
}

/// One asset's account entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountPayload {
    /// Asset symbol.
    pub currency: String,
    /// Total balance.
    pub balance: Decimal,
    /// Unencumbered balance.
    pub available: Decimal,
}

/// Account balances response.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountsResponse {
    /// Per-asset entries.
    pub accounts: Vec<AccountPayload>,
}

impl AccountPayload {
    /// Convert into a balance entry.
    #[must_use]
    pub fn into_balance_entry(self) -> BalanceEntry {
        BalanceEntry {
            asset: self.currency,
            total: self.balance,
            available: self.available,
        }
    }
}

/// Order submission request body.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderPayload {
    /// Venue instrument name.
    pub instrument_name: String,
    /// `BUY` or `SELL`.
    pub side: String,
    /// Limit price, stringified to avoid float drift.
    pub price: String,
    /// Base amount, stringified to avoid float drift.
    pub quantity: String,
}

/// One element of the order submission response.
///
/// The venue answers with a list of created orders; a plain limit order
/// yields exactly one element.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedOrderPayload {
    /// Venue-assigned order id.
    pub id: String,
}

/// Cancel response.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelResponsePayload {
    /// Zero on acceptance of the cancel request.
    pub code: i64,
}

/// One order from the account orders listing or the push channel.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPayload {
    /// Venue order id.
    pub order_id: String,
    /// Venue status string.
    pub status: String,
    /// Failure reason, when the venue provides one.
    #[serde(default)]
    pub reason: Option<String>,
}

impl OrderPayload {
    /// Convert into a status report; `None` for unknown status vocabulary.
    #[must_use]
    pub fn into_status_report(self) -> Option<OrderStatusReport> {
        let status = OrderStatus::from_venue(&self.status)?;
        Some(OrderStatusReport {
            exchange_order_id: ExchangeOrderId::new(self.order_id),
            status,
            reason: self.reason,
        })
    }
}

/// One fill from the account trades listing or the push channel.
#[derive(Debug, Clone, Deserialize)]
pub struct TradePayload {
    /// Venue trade id.
    pub trade_id: String,
    /// Venue order id the fill belongs to.
    pub order_id: String,
    /// Traded price.
    pub traded_price: Decimal,
    /// Traded base amount.
    pub traded_quantity: Decimal,
    /// Fee charged.
    pub fee: Decimal,
    /// Asset the fee was charged in.
    pub fee_currency: String,
    /// Fill time, milliseconds since the epoch.
    pub create_time: i64,
}

impl TradePayload {
    /// Convert into a trade report.
    #[must_use]
    pub fn into_trade_report(self) -> TradeReport {
        let traded_at = Utc
            .timestamp_millis_opt(self.create_time)
            .single()
            .unwrap_or_else(Utc::now);
        TradeReport {
            trade_id: TradeId::new(self.trade_id),
            exchange_order_id: ExchangeOrderId::new(self.order_id),
            price: self.traded_price,
            amount: self.traded_quantity,
            fee: self.fee,
            fee_asset: self.fee_currency,
            traded_at,
        }
    }
}

/// One price level of the depth payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DepthLevelPayload {
    /// Level price.
    pub price: Decimal,
    /// Resting volume at the level.
    pub volume: Decimal,
}

/// Full order book payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookPayload {
    /// Bid levels.
    pub bids: Vec<DepthLevelPayload>,
    /// Ask levels.
    pub asks: Vec<DepthLevelPayload>,
    /// Sequence number of this book state.
    pub update_id: u64,
}
