//! WebSocket wire messages for market data and account channels.
//!
//! Every frame is decoded into a typed payload at this boundary; nothing
//! dict-shaped crosses into the connector core.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::MarketTrade;
use crate::domain::shared::TradeId;

/// Outgoing subscription request.
#[derive(Debug, Clone, Serialize)]
pub struct WsSubscribe {
    /// Always `subscribe`.
    pub event: String,
    /// Channel to subscribe to.
    pub channel: String,
}

impl WsSubscribe {
    /// Build a subscription request for a channel.
    #[must_use]
    pub fn channel(channel: impl Into<String>) -> Self {
        Self {
            event: "subscribe".to_string(),
            channel: channel.into(),
        }
    }
}

/// Incoming frame envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WsEnvelope {
    /// Frame body.
    pub result: WsResult,
}

/// Envelope body: channel tag plus the channel-specific payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WsResult {
    /// Channel the frame belongs to.
    pub channel: String,
    /// Channel-specific payload, decoded per channel kind.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// The channel taxonomy this connector subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKind {
    /// Public depth updates for an instrument.
    MarketDepth {
        /// Instrument name embedded in the channel.
        instrument: String,
    },
    /// Public trade prints for an instrument.
    MarketTrades {
        /// Instrument name embedded in the channel.
        instrument: String,
    },
    /// The account's fills.
    AccountTrades,
    /// The account's order status updates.
    AccountOrders,
    /// The account's balance changes.
    AccountBalances,
}

impl ChannelKind {
    /// Classify a channel string.
    ///
    /// Account channels embed addresses after the prefix; market channels
    /// embed the instrument name. Longest prefixes are tested first so the
    /// account variants never fall through to the public ones.
    #[must_use]
    pub fn parse(channel: &str) -> Option<Self> {
        if channel.starts_with("orderbook:orders:makerAddress:updates") {
            return Some(Self::AccountOrders);
        }
        if channel.starts_with("trades:ticker:address") {
            return Some(Self::AccountTrades);
        }
        if channel.starts_with("positions:address") {
            return Some(Self::AccountBalances);
        }
        if let Some(instrument) = channel.strip_prefix("orderbook:ticker:") {
            return Some(Self::MarketDepth {
                instrument: instrument.to_string(),
            });
        }
        if let Some(instrument) = channel.strip_prefix("trades:ticker:") {
            return Some(Self::MarketTrades {
                instrument: instrument.to_string(),
            });
        }
        None
    }

    /// Channel name for subscribing to depth updates of an instrument.
    #[must_use]
    pub fn market_depth_channel(instrument: &str) -> String {
        format!("orderbook:ticker:{instrument}")
    }

    /// Channel name for subscribing to trade prints of an instrument.
    #[must_use]
    pub fn market_trades_channel(instrument: &str) -> String {
        format!("trades:ticker:{instrument}")
    }

    /// Channel name for the account fills stream.
    #[must_use]
    pub fn account_trades_channel(instrument: &str, maker: &str) -> String {
        format!("trades:ticker:address:{instrument}:{maker}")
    }

    /// Channel name for the account order updates stream.
    #[must_use]
    pub fn account_orders_channel(instrument: &str, maker: &str) -> String {
        format!("orderbook:orders:makerAddress:updates:{instrument}:{maker}")
    }

    /// Channel name for the account balances stream.
    #[must_use]
    pub fn account_balances_channel(maker: &str) -> String {
        format!("positions:address:{maker}")
    }
}

/// One public trade print from the market trades channel.
#[derive(Debug, Clone, Deserialize)]
pub struct PublicTradePayload {
    /// Traded price.
    pub price: Decimal,
    /// Traded base amount.
    pub volume: Decimal,
    /// Trade time, milliseconds since the epoch.
    pub timestamp: i64,
    /// Venue trade id, when present.
    #[serde(default)]
    pub trade_id: Option<String>,
}

impl PublicTradePayload {
    /// Convert into the port-level trade type.
    #[must_use]
    pub fn into_market_trade(self) -> MarketTrade {
        let traded_at: DateTime<Utc> = Utc
            .timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or_else(Utc::now);
        MarketTrade {
            price: self.price,
            amount: self.volume,
            trade_id: self.trade_id.map(TradeId::new),
            traded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn subscribe_serializes() {
        let subscribe = WsSubscribe::channel("orderbook:ticker:OEX_FUT_1JAN_135.00-DAI");
        let json = serde_json::to_string(&subscribe).unwrap();
        assert!(json.contains("\"event\":\"subscribe\""));
        assert!(json.contains("orderbook:ticker:OEX_FUT_1JAN_135.00-DAI"));
    }

    #[test]
    fn account_channels_win_over_public_prefixes() {
        assert_eq!(
            ChannelKind::parse("trades:ticker:address:OEX_FUT_1JAN_135.00-DAI:0xmaker"),
            Some(ChannelKind::AccountTrades)
        );
        assert_eq!(
            ChannelKind::parse("trades:ticker:OEX_FUT_1JAN_135.00-DAI"),
            Some(ChannelKind::MarketTrades {
                instrument: "OEX_FUT_1JAN_135.00-DAI".to_string()
            })
        );
        assert_eq!(
            ChannelKind::parse("orderbook:orders:makerAddress:updates:X:0xmaker"),
            Some(ChannelKind::AccountOrders)
        );
        assert_eq!(
            ChannelKind::parse("positions:address:0xmaker"),
            Some(ChannelKind::AccountBalances)
        );
        assert_eq!(ChannelKind::parse("heartbeat"), None);
    }

    #[test]
    fn envelope_decodes() {
        let raw = r#"{
            "result": {
                "channel": "trades:ticker:OEX_FUT_1JAN_135.00-DAI",
                "data": [{"price": 14.5, "volume": 1, "timestamp": 1588902493045}]
            }
        }"#;
        let envelope: WsEnvelope = serde_json::from_str(raw).unwrap();
        assert!(envelope.result.channel.starts_with("trades:"));

        let trades: Vec<PublicTradePayload> =
            serde_json::from_value(envelope.result.data).unwrap();
        let trade = trades[0].clone().into_market_trade();
        assert_eq!(trade.price, dec!(14.5));
        assert!(trade.trade_id.is_none());
    }
}
