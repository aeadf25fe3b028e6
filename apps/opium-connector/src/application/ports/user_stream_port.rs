//! User Stream Port (Driven Port)
//!
//! Authenticated account channel: order status updates, account fills, and
//! balance changes pushed by the venue.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::exchange_port::{BalanceEntry, OrderStatusReport, TradeReport};

/// Typed events produced by the account stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEvent {
    /// An order status changed.
    Order(OrderStatusReport),
    /// A fill occurred on one of the account's orders.
    Trade(TradeReport),
    /// Balances changed for one or more assets.
    Balance(Vec<BalanceEntry>),
}

/// Port for the authenticated push channel.
///
/// `run` re-authenticates and resubscribes on any failure after a short
/// backoff; it returns only on cancellation. `last_recv_time` feeds the
/// connector's liveness heuristic and must advance on every message the
/// stream delivers, whether or not it decodes into an `AccountEvent`.
#[async_trait]
pub trait UserStreamSource: Send + Sync {
    /// Instant the stream last delivered any message, if it ever has.
    fn last_recv_time(&self) -> Option<Instant>;

    /// Pump account events into `sink` until `cancel` fires.
    async fn run(
        self: Arc<Self>,
        sink: mpsc::UnboundedSender<AccountEvent>,
        cancel: CancellationToken,
    );
}
