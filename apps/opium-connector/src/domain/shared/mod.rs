//! Shared value objects used across the connector.

mod identifiers;
mod trading_pair;

pub use identifiers::{ClientOrderId, ExchangeOrderId, TradeId};
pub use trading_pair::TradingPair;
