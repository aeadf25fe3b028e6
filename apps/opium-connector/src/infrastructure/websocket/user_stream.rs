//! Authenticated account stream for the Opium venue.

use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{AccountEvent, UserStreamSource};
use crate::domain::shared::TradingPair;
use crate::infrastructure::auth::AccessTokenSigner;
use crate::infrastructure::config::Intervals;
use crate::infrastructure::retry::retry_forever;
use crate::infrastructure::rest::api_types::{AccountPayload, OrderPayload, TradePayload};

use super::market_stream::WsSessionError;
use super::messages::{ChannelKind, WsEnvelope, WsSubscribe};
use super::reconnect::ReconnectPolicy;

/// Push source for order, fill, and balance updates of one account.
pub struct OpiumUserStream {
    ws_url: String,
    trading_pairs: Vec<TradingPair>,
    signer: AccessTokenSigner,
    intervals: Intervals,
    last_recv: Mutex<Option<Instant>>,
}

impl OpiumUserStream {
    /// Create a user stream source.
    #[must_use]
    pub fn new(
        ws_url: impl Into<String>,
        trading_pairs: Vec<TradingPair>,
        signer: AccessTokenSigner,
        intervals: Intervals,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            trading_pairs,
            signer,
            intervals,
            last_recv: Mutex::new(None),
        }
    }

    fn touch(&self) {
        *self.last_recv.lock() = Some(Instant::now());
    }

    /// One authenticated session: sign, subscribe, pump until it drops.
    async fn session(
        &self,
        sink: &mpsc::UnboundedSender<AccountEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), WsSessionError> {
        let token = self
            .signer
            .access_token(Utc::now())
            .map_err(|e| WsSessionError::Subscription(e.to_string()))?;
        let maker = self.signer.public_key();

        let url = format!("{}?authToken={token}", self.ws_url);
        let (ws_stream, _response) = connect_async(&url).await?;
        let (mut write, mut read) = ws_stream.split();
        tracing::info!(maker = %maker, "account websocket connected");

        for pair in &self.trading_pairs {
            for channel in [
                ChannelKind::account_trades_channel(pair.as_str(), maker),
                ChannelKind::account_orders_channel(pair.as_str(), maker),
            ] {
                let subscribe = WsSubscribe::channel(channel);
                write
                    .send(Message::Text(serde_json::to_string(&subscribe)?.into()))
                    .await?;
            }
        }
        let subscribe = WsSubscribe::channel(ChannelKind::account_balances_channel(maker));
        write
            .send(Message::Text(serde_json::to_string(&subscribe)?.into()))
            .await?;

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                message = read.next() => {
                    let Some(message) = message else {
                        return Err(WsSessionError::ConnectionClosed);
                    };
                    match message? {
                        Message::Text(text) => {
                            // Liveness counts every delivered frame, decodable
                            // or not.
                            self.touch();
                            if let Err(error) = Self::dispatch_frame(&text, sink) {
                                tracing::debug!(error = %error, "undecodable account frame");
                            }
                        }
                        Message::Ping(payload) => {
                            self.touch();
                            write.send(Message::Pong(payload)).await?;
                        }
                        Message::Close(_) => {
                            return Err(WsSessionError::ConnectionClosed);
                        }
                        _ => self.touch(),
                    }
                }
            }
        }
    }

    fn dispatch_frame(
        text: &str,
        sink: &mpsc::UnboundedSender<AccountEvent>,
    ) -> Result<(), serde_json::Error> {
        let envelope: WsEnvelope = serde_json::from_str(text)?;
        match ChannelKind::parse(&envelope.result.channel) {
            Some(ChannelKind::AccountTrades) => {
                let trades: Vec<TradePayload> = serde_json::from_value(envelope.result.data)?;
                for trade in trades {
                    let _ = sink.send(AccountEvent::Trade(trade.into_trade_report()));
                }
            }
            Some(ChannelKind::AccountOrders) => {
                let orders: Vec<OrderPayload> = serde_json::from_value(envelope.result.data)?;
                for order in orders {
                    if let Some(report) = order.into_status_report() {
                        let _ = sink.send(AccountEvent::Order(report));
                    }
                }
            }
            Some(ChannelKind::AccountBalances) => {
                let accounts: Vec<AccountPayload> = serde_json::from_value(envelope.result.data)?;
                let balances = accounts
                    .into_iter()
                    .map(AccountPayload::into_balance_entry)
                    .collect();
                let _ = sink.send(AccountEvent::Balance(balances));
            }
            _ => {}
        }
        Ok(())
    }
}

#[async_trait]
impl UserStreamSource for OpiumUserStream {
    fn last_recv_time(&self) -> Option<Instant> {
        *self.last_recv.lock()
    }

    async fn run(
        self: Arc<Self>,
        sink: mpsc::UnboundedSender<AccountEvent>,
        cancel: CancellationToken,
    ) {
        let source = Arc::clone(&self);
        let session_cancel = cancel.clone();
        retry_forever(
            "user-stream",
            ReconnectPolicy::fixed(self.intervals.stream_retry()),
            cancel,
            move || {
                let source = Arc::clone(&source);
                let sink = sink.clone();
                let cancel = session_cancel.clone();
                async move { source.session(&sink, &cancel).await }
            },
        )
        .await;
    }
}
