//! Result and status types for the connector's public surface.

use rust_decimal::Decimal;

use crate::domain::order_tracking::{OrderKind, OrderStatus};
use crate::domain::shared::{ClientOrderId, TradingPair};

/// Outcome of one cancellation attempt, as reported by `cancel_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationResult {
    /// Order the attempt was for.
    pub order_id: ClientOrderId,
    /// Whether the order reached `CANCELLED`.
    pub success: bool,
    /// Failure detail, when unsuccessful.
    pub error: Option<String>,
}

impl CancellationResult {
    /// A successful cancellation.
    #[must_use]
    pub const fn succeeded(order_id: ClientOrderId) -> Self {
        Self {
            order_id,
            success: true,
            error: None,
        }
    }

    /// A failed cancellation.
    #[must_use]
    pub const fn failed(order_id: ClientOrderId, error: String) -> Self {
        Self {
            order_id,
            success: false,
            error: Some(error),
        }
    }
}

/// Readiness of the connector's components.
///
/// External callers should treat `ready()` as the sole precondition for
/// trusting any derived state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorStatus {
    /// Every tracked order book has received a snapshot.
    pub order_books_initialized: bool,
    /// Account balances have been populated (or trading is not required).
    pub account_balance: bool,
    /// Trading rules have been loaded.
    pub trading_rules_initialized: bool,
    /// The account stream has delivered at least one message (or trading
    /// is not required).
    pub user_stream_initialized: bool,
}

impl ConnectorStatus {
    /// True when every component has converged.
    #[must_use]
    pub const fn ready(&self) -> bool {
        self.order_books_initialized
            && self.account_balance
            && self.trading_rules_initialized
            && self.user_stream_initialized
    }
}

/// Rejections raised before an order submission leaves this process.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OrderValidationError {
    /// The venue only accepts limit-type orders.
    #[error("unsupported order type: {kind}")]
    UnsupportedOrderType {
        /// The rejected order type.
        kind: OrderKind,
    },

    /// No trading rule is loaded for the instrument.
    #[error("no trading rule for {trading_pair}")]
    MissingTradingRule {
        /// The unconfigured instrument.
        trading_pair: TradingPair,
    },

    /// The quantized amount is below the venue minimum.
    #[error("order amount {amount} is below the minimum order size {minimum}")]
    BelowMinimumSize {
        /// Quantized amount.
        amount: Decimal,
        /// Venue minimum.
        minimum: Decimal,
    },
}

/// Failures of a single cancellation attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CancelError {
    /// The order is not tracked.
    #[error("order {order_id} not found")]
    OrderNotFound {
        /// The unknown order.
        order_id: ClientOrderId,
    },

    /// The venue never assigned an exchange id within the wait budget.
    #[error("timed out waiting for exchange order id of {order_id}")]
    ExchangeIdTimeout {
        /// The order still awaiting its id.
        order_id: ClientOrderId,
    },

    /// The order reached a terminal state other than cancelled.
    #[error("order {order_id} already terminal in state {status}")]
    AlreadyTerminal {
        /// The order.
        order_id: ClientOrderId,
        /// Its terminal state.
        status: OrderStatus,
    },

    /// The cancel request failed at the venue.
    #[error("cancel rejected: {message}")]
    Exchange {
        /// Failure detail.
        message: String,
    },

    /// The cancellation was not confirmed within the wait budget.
    #[error("timed out waiting for cancellation of {order_id}")]
    ConfirmationTimeout {
        /// The order whose confirmation never arrived.
        order_id: ClientOrderId,
    },
}
