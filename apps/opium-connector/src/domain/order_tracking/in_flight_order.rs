//! In-flight order entity: per-order state machine plus fill accounting.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::shared::{ClientOrderId, ExchangeOrderId, TradeId, TradingPair};

use super::state_machine::{OrderKind, OrderStateMachine, OrderStatus, TradeSide};

/// One fill applied to an order, already matched by exchange order id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    /// Venue trade id; the deduplication key.
    pub trade_id: TradeId,
    /// Traded price.
    pub price: Decimal,
    /// Traded base amount.
    pub amount: Decimal,
    /// Fee charged for this fill.
    pub fee: Decimal,
    /// Asset the fee was charged in.
    pub fee_asset: String,
}

/// Outcome of applying a fill to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// The trade id was seen before; nothing changed.
    Duplicate,
    /// The fill was applied; the order is still working.
    Applied,
    /// The fill was applied and completed the order.
    Completed,
}

/// A locally tracked order, from submission until a terminal state.
///
/// The same fill can arrive via the push stream and a REST poll; the seen
/// trade-id set makes `apply_fill` idempotent so fill events fire exactly
/// once per venue trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InFlightOrder {
    /// Locally generated id, immutable for the order's lifetime.
    pub client_order_id: ClientOrderId,
    /// Venue-assigned id, set once the submission is acknowledged.
    pub exchange_order_id: Option<ExchangeOrderId>,
    /// Instrument the order trades.
    pub trading_pair: TradingPair,
    /// Buy or sell.
    pub side: TradeSide,
    /// Requested order type (always a limit type once tracked).
    pub kind: OrderKind,
    /// Limit price.
    pub price: Decimal,
    /// Requested base amount.
    pub amount: Decimal,
    /// Cumulative executed base amount.
    pub executed_amount_base: Decimal,
    /// Cumulative executed quote amount.
    pub executed_amount_quote: Decimal,
    /// Cumulative fee paid.
    pub fee_paid: Decimal,
    /// Asset the fee is denominated in, from the first fill.
    pub fee_asset: Option<String>,
    /// Current lifecycle state.
    pub status: OrderStatus,
    /// Venue trade ids already accounted for.
    seen_trade_ids: HashSet<TradeId>,
}

impl InFlightOrder {
    /// Start tracking a freshly submitted order.
    #[must_use]
    pub fn new(
        client_order_id: ClientOrderId,
        trading_pair: TradingPair,
        side: TradeSide,
        kind: OrderKind,
        price: Decimal,
        amount: Decimal,
    ) -> Self {
        Self {
            client_order_id,
            exchange_order_id: None,
            trading_pair,
            side,
            kind,
            price,
            amount,
            executed_amount_base: Decimal::ZERO,
            executed_amount_quote: Decimal::ZERO,
            fee_paid: Decimal::ZERO,
            fee_asset: None,
            status: OrderStatus::PendingCreate,
            seen_trade_ids: HashSet::new(),
        }
    }

    /// Whether the order has reached a terminal state.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record the venue acknowledgement.
    pub fn set_exchange_order_id(&mut self, id: ExchangeOrderId) {
        self.exchange_order_id = Some(id);
        if self.status == OrderStatus::PendingCreate {
            self.status = OrderStatus::Open;
        }
    }

    /// Move to a new lifecycle state if the transition is legal.
    ///
    /// Illegal transitions (e.g. a late cancel confirmation for a filled
    /// order) are dropped and reported as `false`.
    pub fn transition_to(&mut self, status: OrderStatus) -> bool {
        if OrderStateMachine::is_valid_transition(self.status, status) {
            self.status = status;
            true
        } else {
            false
        }
    }

    /// Apply a fill, deduplicated by trade id.
    ///
    /// Completion is decided with a small tolerance so venue rounding of
    /// the final partial fill cannot leave the order working forever.
    pub fn apply_fill(&mut self, fill: &Fill) -> FillOutcome {
        if self.is_done() {
            // A terminal order accepts no further accounting; remember the
            // trade id so a replay stays silent.
            self.seen_trade_ids.insert(fill.trade_id.clone());
            return FillOutcome::Duplicate;
        }
        if !self.seen_trade_ids.insert(fill.trade_id.clone()) {
            return FillOutcome::Duplicate;
        }

        self.executed_amount_base += fill.amount;
        self.executed_amount_quote += fill.amount * fill.price;
        self.fee_paid += fill.fee;
        if self.fee_asset.is_none() {
            self.fee_asset = Some(fill.fee_asset.clone());
        }

        if self.amount - self.executed_amount_base <= completion_tolerance() {
            self.transition_to(OrderStatus::Filled);
            FillOutcome::Completed
        } else {
            self.transition_to(OrderStatus::PartiallyFilled);
            FillOutcome::Applied
        }
    }
}

/// Absorbs rounding drift between requested and reported fill amounts.
fn completion_tolerance() -> Decimal {
    Decimal::new(1, 9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> InFlightOrder {
        InFlightOrder::new(
            ClientOrderId::new("buy-1"),
            TradingPair::new("OEX_FUT_1JAN_135.00-DAI"),
            TradeSide::Buy,
            OrderKind::Limit,
            dec!(14.5),
            dec!(1),
        )
    }

    fn fill(trade_id: &str, amount: Decimal) -> Fill {
        Fill {
            trade_id: TradeId::new(trade_id),
            price: dec!(14.5),
            amount,
            fee: dec!(0.01),
            fee_asset: "DAI".to_string(),
        }
    }

    #[test]
    fn starts_pending_without_exchange_id() {
        let order = order();
        assert_eq!(order.status, OrderStatus::PendingCreate);
        assert!(order.exchange_order_id.is_none());
        assert!(!order.is_done());
    }

    #[test]
    fn ack_moves_to_open() {
        let mut order = order();
        order.set_exchange_order_id(ExchangeOrderId::new("783452"));
        assert_eq!(order.status, OrderStatus::Open);
    }

    #[test]
    fn full_fill_completes_once() {
        let mut order = order();
        order.set_exchange_order_id(ExchangeOrderId::new("783452"));

        let outcome = order.apply_fill(&fill("T1", dec!(1)));
        assert_eq!(outcome, FillOutcome::Completed);
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.executed_amount_base, dec!(1));
        assert_eq!(order.executed_amount_quote, dec!(14.5));
        assert_eq!(order.fee_paid, dec!(0.01));
        assert_eq!(order.fee_asset.as_deref(), Some("DAI"));
    }

    #[test]
    fn duplicate_trade_id_is_not_double_counted() {
        let mut order = order();
        order.set_exchange_order_id(ExchangeOrderId::new("783452"));

        assert_eq!(order.apply_fill(&fill("T1", dec!(1))), FillOutcome::Completed);
        assert_eq!(order.apply_fill(&fill("T1", dec!(1))), FillOutcome::Duplicate);
        assert_eq!(order.executed_amount_base, dec!(1));
        assert_eq!(order.fee_paid, dec!(0.01));
    }

    #[test]
    fn partial_fills_accumulate() {
        let mut order = order();
        order.set_exchange_order_id(ExchangeOrderId::new("783452"));

        assert_eq!(order.apply_fill(&fill("T1", dec!(0.4))), FillOutcome::Applied);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.apply_fill(&fill("T2", dec!(0.6))), FillOutcome::Completed);
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.executed_amount_base, dec!(1.0));
    }

    #[test]
    fn completion_tolerance_absorbs_rounding() {
        let mut order = order();
        order.set_exchange_order_id(ExchangeOrderId::new("783452"));

        let outcome = order.apply_fill(&fill("T1", dec!(0.9999999999)));
        assert_eq!(outcome, FillOutcome::Completed);
    }

    #[test]
    fn late_cancel_after_fill_is_dropped() {
        let mut order = order();
        order.set_exchange_order_id(ExchangeOrderId::new("783452"));
        order.apply_fill(&fill("T1", dec!(1)));

        assert!(!order.transition_to(OrderStatus::Cancelled));
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[test]
    fn tracking_state_serde_round_trip() {
        let mut order = order();
        order.set_exchange_order_id(ExchangeOrderId::new("783452"));
        order.apply_fill(&fill("T1", dec!(0.4)));

        let json = serde_json::to_string(&order).unwrap();
        let mut restored: InFlightOrder = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.client_order_id, order.client_order_id);
        assert_eq!(restored.executed_amount_base, dec!(0.4));
        assert_eq!(restored.status, OrderStatus::PartiallyFilled);

        // The dedup set survives the round trip.
        assert_eq!(
            restored.apply_fill(&fill("T1", dec!(0.4))),
            FillOutcome::Duplicate
        );
    }
}
