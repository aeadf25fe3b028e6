//! Exchange Port (Driven Port)
//!
//! Interface for the venue's REST surface: order entry, cancellation, and
//! the account/instrument reads used for reconciliation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order_book::BookRow;
use crate::domain::order_tracking::{OrderKind, OrderStatus, TradeSide};
use crate::domain::shared::{ExchangeOrderId, TradeId, TradingPair};
use crate::domain::trading_rules::TradingRule;

/// Request to submit an order to the venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    /// Instrument to trade.
    pub trading_pair: TradingPair,
    /// Order side.
    pub side: TradeSide,
    /// Order type (limit types only; validated before this point).
    pub kind: OrderKind,
    /// Limit price, already quantized.
    pub price: Decimal,
    /// Base amount, already quantized.
    pub amount: Decimal,
}

impl SubmitOrderRequest {
    /// Create a limit order request.
    #[must_use]
    pub const fn limit(
        trading_pair: TradingPair,
        side: TradeSide,
        price: Decimal,
        amount: Decimal,
    ) -> Self {
        Self {
            trading_pair,
            side,
            kind: OrderKind::Limit,
            price,
            amount,
        }
    }
}

/// Acknowledgement returned by the venue for a submitted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    /// Venue-assigned order id.
    pub exchange_order_id: ExchangeOrderId,
}

/// One asset's balances as reported by the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    /// Asset symbol.
    pub asset: String,
    /// Total balance.
    pub total: Decimal,
    /// Balance not encumbered by open orders.
    pub available: Decimal,
}

/// Status of one order as reported by the venue (REST poll or push).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusReport {
    /// Venue order id.
    pub exchange_order_id: ExchangeOrderId,
    /// Mapped lifecycle status.
    pub status: OrderStatus,
    /// Venue-supplied reason for failures, when present.
    pub reason: Option<String>,
}

/// One fill as reported by the venue (REST poll or push).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReport {
    /// Venue trade id, the deduplication key.
    pub trade_id: TradeId,
    /// Venue order id the fill belongs to.
    pub exchange_order_id: ExchangeOrderId,
    /// Traded price.
    pub price: Decimal,
    /// Traded base amount.
    pub amount: Decimal,
    /// Fee charged.
    pub fee: Decimal,
    /// Asset the fee was charged in.
    pub fee_asset: String,
    /// Venue timestamp of the fill.
    pub traded_at: DateTime<Utc>,
}

/// Full order book snapshot fetched over REST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSnapshot {
    /// Bid rows.
    pub bids: Vec<BookRow>,
    /// Ask rows.
    pub asks: Vec<BookRow>,
    /// Sequence number of the snapshot.
    pub update_id: u64,
}

/// Exchange port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExchangeError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("exchange network error: {message}")]
    Network {
        /// Error details.
        message: String,
    },

    /// The venue throttled the request.
    #[error("rate limited by exchange")]
    RateLimited {
        /// Seconds to wait before retrying, when the venue said so.
        retry_after_secs: Option<u64>,
    },

    /// The venue rejected the request.
    #[error("rejected by exchange: {reason}")]
    Rejected {
        /// Rejection reason.
        reason: String,
    },

    /// The referenced order does not exist on the venue.
    #[error("order not found: {order_id}")]
    OrderNotFound {
        /// The missing order id.
        order_id: String,
    },

    /// The request was malformed before it left this process.
    #[error("validation error: {message}")]
    Validation {
        /// Error details.
        message: String,
    },

    /// Anything the taxonomy does not cover.
    #[error("exchange error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

impl ExchangeError {
    /// Whether retrying the same request later can succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::RateLimited { .. })
    }
}

/// Port for venue REST interactions.
#[async_trait]
pub trait ExchangePort: Send + Sync {
    /// Fetch the last traded price for an instrument.
    async fn last_traded_price(&self, pair: &TradingPair) -> Result<Decimal, ExchangeError>;

    /// Fetch a full order book snapshot.
    async fn order_book_snapshot(&self, pair: &TradingPair) -> Result<BookSnapshot, ExchangeError>;

    /// Fetch the instrument list as trading rules.
    async fn trading_rules(&self) -> Result<Vec<TradingRule>, ExchangeError>;

    /// Submit an order.
    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, ExchangeError>;

    /// Cancel an order by its venue id.
    async fn cancel_order(&self, order_id: &ExchangeOrderId) -> Result<(), ExchangeError>;

    /// Fetch account balances.
    async fn balances(&self) -> Result<Vec<BalanceEntry>, ExchangeError>;

    /// Fetch the account's orders for an instrument.
    async fn account_orders(
        &self,
        pair: &TradingPair,
    ) -> Result<Vec<OrderStatusReport>, ExchangeError>;

    /// Fetch the account's trades for an instrument.
    async fn account_trades(&self, pair: &TradingPair) -> Result<Vec<TradeReport>, ExchangeError>;
}
