//! Ports - interfaces between the connector core and the outside world.

mod event_publisher_port;
mod exchange_port;
mod market_data_port;
mod user_stream_port;

pub use event_publisher_port::{ChannelEventPublisher, EventPublisherPort, NoOpEventPublisher};
pub use exchange_port::{
    BalanceEntry, BookSnapshot, ExchangeError, ExchangePort, OrderAck, OrderStatusReport,
    SubmitOrderRequest, TradeReport,
};
pub use market_data_port::{MarketDataMessage, MarketDataSource, MarketTrade};
pub use user_stream_port::{AccountEvent, UserStreamSource};
