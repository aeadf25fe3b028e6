//! WebSocket integration: reconnect policy, wire messages, and stream sources.

pub mod messages;
mod market_stream;
mod reconnect;
mod user_stream;

pub use market_stream::{OpiumMarketStream, WsSessionError};
pub use reconnect::ReconnectPolicy;
pub use user_stream::OpiumUserStream;
