//! Lifecycle events emitted by the connector.
//!
//! Consumed by strategy/listener code outside this crate. Every state
//! change of an in-flight order produces exactly one event.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{ClientOrderId, TradeId, TradingPair};

use super::state_machine::{OrderKind, TradeSide};

/// A connector lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConnectorEvent {
    /// A buy order was acknowledged by the venue.
    BuyOrderCreated(OrderCreated),
    /// A sell order was acknowledged by the venue.
    SellOrderCreated(OrderCreated),
    /// A single fill was applied to an order.
    OrderFilled(OrderFilled),
    /// A buy order reached its full requested amount.
    BuyOrderCompleted(OrderCompleted),
    /// A sell order reached its full requested amount.
    SellOrderCompleted(OrderCompleted),
    /// An order cancellation was confirmed.
    OrderCancelled(OrderCancelled),
    /// An order failed: submission rejected or venue-side failure.
    OrderFailure(OrderFailure),
}

/// Payload for order-created events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Requested order type.
    pub kind: OrderKind,
    /// Instrument.
    pub trading_pair: TradingPair,
    /// Requested base amount.
    pub amount: Decimal,
    /// Limit price.
    pub price: Decimal,
    /// Local order id.
    pub client_order_id: ClientOrderId,
}

/// Payload for per-fill events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilled {
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Local order id.
    pub client_order_id: ClientOrderId,
    /// Instrument.
    pub trading_pair: TradingPair,
    /// Side of the filled order.
    pub side: TradeSide,
    /// Order type of the filled order.
    pub kind: OrderKind,
    /// Fill price.
    pub price: Decimal,
    /// Fill base amount.
    pub amount: Decimal,
    /// Fee charged for the fill.
    pub fee: Decimal,
    /// Asset the fee was charged in.
    pub fee_asset: String,
    /// Venue trade id for the fill.
    pub trade_id: TradeId,
}

/// Payload for order-completed events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompleted {
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Local order id.
    pub client_order_id: ClientOrderId,
    /// Base (contract) part of the instrument.
    pub base_asset: String,
    /// Quote asset of the instrument.
    pub quote_asset: String,
    /// Total executed base amount.
    pub executed_amount_base: Decimal,
    /// Total executed quote amount.
    pub executed_amount_quote: Decimal,
    /// Total fee paid over the order's life.
    pub fee_paid: Decimal,
    /// Asset the fee was paid in, when known.
    pub fee_asset: Option<String>,
    /// Order type.
    pub kind: OrderKind,
}

/// Payload for cancellation events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Local order id.
    pub client_order_id: ClientOrderId,
}

/// Payload for failure events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFailure {
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Local order id.
    pub client_order_id: ClientOrderId,
    /// Order type of the failed order.
    pub kind: OrderKind,
}

impl ConnectorEvent {
    /// The client order id the event refers to.
    #[must_use]
    pub const fn client_order_id(&self) -> &ClientOrderId {
        match self {
            Self::BuyOrderCreated(e) | Self::SellOrderCreated(e) => &e.client_order_id,
            Self::OrderFilled(e) => &e.client_order_id,
            Self::BuyOrderCompleted(e) | Self::SellOrderCompleted(e) => &e.client_order_id,
            Self::OrderCancelled(e) => &e.client_order_id,
            Self::OrderFailure(e) => &e.client_order_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn event_exposes_client_order_id() {
        let event = ConnectorEvent::OrderCancelled(OrderCancelled {
            timestamp: Utc::now(),
            client_order_id: ClientOrderId::new("buy-1"),
        });
        assert_eq!(event.client_order_id().as_str(), "buy-1");
    }

    #[test]
    fn event_serde_tags_variant() {
        let event = ConnectorEvent::OrderFilled(OrderFilled {
            timestamp: Utc::now(),
            client_order_id: ClientOrderId::new("buy-1"),
            trading_pair: TradingPair::new("OEX_FUT_1JAN_135.00-DAI"),
            side: TradeSide::Buy,
            kind: OrderKind::Limit,
            price: dec!(14.5),
            amount: dec!(1),
            fee: dec!(0.01),
            fee_asset: "DAI".to_string(),
            trade_id: TradeId::new("T1"),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"order_filled\""));
    }
}
