//! Order lifecycle states and transition validation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    /// Buy the base asset.
    Buy,
    /// Sell the base asset.
    Sell,
}

impl TradeSide {
    /// Lowercase tag used in client order ids and logs.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Plain limit order.
    Limit,
    /// Post-only limit order.
    LimitMaker,
    /// Market order. Opium does not support these; rejected before submission.
    Market,
}

impl OrderKind {
    /// Whether this is a limit-type order the venue accepts.
    #[must_use]
    pub const fn is_limit_type(self) -> bool {
        matches!(self, Self::Limit | Self::LimitMaker)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "LIMIT"),
            Self::LimitMaker => write!(f, "LIMIT_MAKER"),
            Self::Market => write!(f, "MARKET"),
        }
    }
}

/// Lifecycle state of an in-flight order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted locally, not yet acknowledged by the venue.
    PendingCreate,
    /// Acknowledged by the venue with no fills yet.
    Open,
    /// Acknowledged with a partial fill.
    PartiallyFilled,
    /// Fully filled (terminal).
    Filled,
    /// Cancel confirmed (terminal).
    Cancelled,
    /// Submission rejected or order failed (terminal).
    Failed,
}

impl OrderStatus {
    /// Whether the order has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Failed)
    }

    /// Map a venue status string onto the local lifecycle.
    ///
    /// Returns `None` for vocabulary this connector does not track.
    #[must_use]
    pub fn from_venue(status: &str) -> Option<Self> {
        match status {
            "PENDING" | "NEW" => Some(Self::PendingCreate),
            "ACTIVE" | "OPEN" => Some(Self::Open),
            "PARTIALLY_FILLED" => Some(Self::PartiallyFilled),
            "FILLED" => Some(Self::Filled),
            "CANCELED" | "CANCELLED" => Some(Self::Cancelled),
            "REJECTED" | "EXPIRED" | "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PendingCreate => "PENDING_CREATE",
            Self::Open => "OPEN",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// Validates lifecycle transitions.
pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Check if a state transition is valid.
    #[must_use]
    pub const fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
        matches!(
            (from, to),
            // From PendingCreate
            (OrderStatus::PendingCreate, OrderStatus::Open)
                | (OrderStatus::PendingCreate, OrderStatus::PartiallyFilled)
                | (OrderStatus::PendingCreate, OrderStatus::Filled)
                | (OrderStatus::PendingCreate, OrderStatus::Cancelled)
                | (OrderStatus::PendingCreate, OrderStatus::Failed)
                // From Open
                | (OrderStatus::Open, OrderStatus::PartiallyFilled)
                | (OrderStatus::Open, OrderStatus::Filled)
                | (OrderStatus::Open, OrderStatus::Cancelled)
                | (OrderStatus::Open, OrderStatus::Failed)
                // From PartiallyFilled
                | (OrderStatus::PartiallyFilled, OrderStatus::PartiallyFilled)
                | (OrderStatus::PartiallyFilled, OrderStatus::Filled)
                | (OrderStatus::PartiallyFilled, OrderStatus::Cancelled)
                | (OrderStatus::PartiallyFilled, OrderStatus::Failed)
        )
    }
}
