//! Market Data Port (Driven Port)
//!
//! One capability set covers REST-polling, push-socket, and hybrid venues:
//! an on-demand snapshot fetch plus a long-running streaming task. The
//! variant is chosen at construction time; consumers only see the typed
//! message stream.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::order_book::BookRow;
use crate::domain::shared::{TradeId, TradingPair};

use super::exchange_port::{BookSnapshot, ExchangeError};

/// A public trade print from the market data channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketTrade {
    /// Traded price.
    pub price: Decimal,
    /// Traded base amount.
    pub amount: Decimal,
    /// Venue trade id, when the channel carries one.
    pub trade_id: Option<TradeId>,
    /// Venue timestamp of the print.
    pub traded_at: DateTime<Utc>,
}

/// Typed messages produced by a market data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketDataMessage {
    /// A full book snapshot (REST poll or full-book push).
    Snapshot {
        /// Instrument the snapshot belongs to.
        trading_pair: TradingPair,
        /// Bid rows.
        bids: Vec<BookRow>,
        /// Ask rows.
        asks: Vec<BookRow>,
        /// Snapshot sequence number.
        update_id: u64,
    },
    /// An incremental book update.
    Diff {
        /// Instrument the diff belongs to.
        trading_pair: TradingPair,
        /// Changed bid levels.
        bids: Vec<BookRow>,
        /// Changed ask levels.
        asks: Vec<BookRow>,
        /// Diff sequence number.
        update_id: u64,
    },
    /// A public trade print.
    Trade {
        /// Instrument the trade belongs to.
        trading_pair: TradingPair,
        /// The trade.
        trade: MarketTrade,
    },
}

impl MarketDataMessage {
    /// Instrument the message refers to.
    #[must_use]
    pub const fn trading_pair(&self) -> &TradingPair {
        match self {
            Self::Snapshot { trading_pair, .. }
            | Self::Diff { trading_pair, .. }
            | Self::Trade { trading_pair, .. } => trading_pair,
        }
    }

    /// Build a snapshot message from a fetched `BookSnapshot`.
    #[must_use]
    pub fn from_snapshot(trading_pair: TradingPair, snapshot: BookSnapshot) -> Self {
        Self::Snapshot {
            trading_pair,
            bids: snapshot.bids,
            asks: snapshot.asks,
            update_id: snapshot.update_id,
        }
    }
}

/// Port for market data sources.
///
/// `run` is an infinite task: on any transport or decode failure it must
/// log, back off, and resume on its own. The only way it returns is
/// cancellation of the provided token.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch a full order book snapshot on demand.
    async fn order_book_snapshot(&self, pair: &TradingPair)
    -> Result<BookSnapshot, ExchangeError>;

    /// Stream snapshots/diffs/trades for all configured instruments into
    /// `sink` until `cancel` fires.
    async fn run(
        self: Arc<Self>,
        sink: mpsc::UnboundedSender<MarketDataMessage>,
        cancel: CancellationToken,
    );
}
