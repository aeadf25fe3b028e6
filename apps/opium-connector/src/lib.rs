// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Opium Connector - Exchange Connectivity Core
//!
//! Order lifecycle and market data reconciliation engine for the Opium
//! exchange. The connector maintains locally consistent order books from
//! two independently unreliable sources (REST snapshots and push
//! updates), tracks per-order state machines against acknowledgements,
//! fills, and cancellations, and emits each lifecycle event exactly once.
//!
//! # Architecture
//!
//! - **Domain**: order books, in-flight orders, trading rules, events -
//!   no I/O.
//! - **Application**: ports for the venue REST surface, market data and
//!   account streams, and the outbound event channel.
//! - **Feed**: the order book tracker and poll-cadence heuristics.
//! - **Execution**: the `OpiumExchange` orchestrator - order entry,
//!   cancellation, and REST/push reconciliation.
//! - **Infrastructure**: reqwest/tungstenite adapters, token signing,
//!   configuration, and the retry-forever wrapper.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Domain layer - core connector state with no I/O dependencies.
pub mod domain;

/// Application layer - port definitions.
pub mod application;

/// Feed layer - order book tracking and poll scheduling.
pub mod feed;

/// Execution layer - the connector orchestrator.
pub mod execution;

/// Infrastructure layer - adapters and external integrations.
pub mod infrastructure;

// Domain re-exports
pub use domain::order_book::{BookRow, BookUpdateMode, OrderBook};
pub use domain::order_tracking::{
    ConnectorEvent, Fill, FillOutcome, InFlightOrder, OrderKind, OrderStatus, TradeSide,
};
pub use domain::shared::{ClientOrderId, ExchangeOrderId, TradeId, TradingPair};
pub use domain::trading_rules::TradingRule;

// Application re-exports
pub use application::ports::{
    AccountEvent, BalanceEntry, BookSnapshot, ChannelEventPublisher, EventPublisherPort,
    ExchangeError, ExchangePort, MarketDataMessage, MarketDataSource, MarketTrade,
    NoOpEventPublisher, OrderAck, OrderStatusReport, SubmitOrderRequest, TradeReport,
    UserStreamSource,
};

// Feed and execution re-exports
pub use execution::{
    CancelError, CancellationResult, ConnectorStatus, OpiumExchange, OrderValidationError,
};
pub use feed::{OrderBookTracker, PollCadence};

// Infrastructure re-exports
pub use infrastructure::config::Settings;
pub use infrastructure::rest::{OpiumHttpClient, OpiumRestAdapter, RetryConfig};
pub use infrastructure::websocket::{OpiumMarketStream, OpiumUserStream, ReconnectPolicy};
