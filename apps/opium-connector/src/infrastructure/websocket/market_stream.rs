//! Market data source for the Opium venue.
//!
//! Depth diffs and trade prints arrive over the websocket; full snapshots
//! come from REST polling. Snapshot-only venues (no depth channel) rely on
//! the polling loop alone, with full-refresh cycles aligned to hour
//! boundaries.

use async_trait::async_trait;
use chrono::{Timelike, Utc};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    BookSnapshot, ExchangeError, ExchangePort, MarketDataMessage, MarketDataSource,
};
use crate::domain::order_book::{BookRow, BookUpdateMode};
use crate::domain::shared::TradingPair;
use crate::infrastructure::config::Intervals;
use crate::infrastructure::retry::retry_forever;

use super::messages::{ChannelKind, PublicTradePayload, WsEnvelope, WsSubscribe};
use super::reconnect::ReconnectPolicy;
use crate::infrastructure::rest::api_types::OrderBookPayload;

/// Streaming + snapshot market data source.
pub struct OpiumMarketStream {
    ws_url: String,
    trading_pairs: Vec<TradingPair>,
    rest: Arc<dyn ExchangePort>,
    mode: BookUpdateMode,
    intervals: Intervals,
}

impl OpiumMarketStream {
    /// Create a market data source.
    #[must_use]
    pub fn new(
        ws_url: impl Into<String>,
        trading_pairs: Vec<TradingPair>,
        rest: Arc<dyn ExchangePort>,
        mode: BookUpdateMode,
        intervals: Intervals,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            trading_pairs,
            rest,
            mode,
            intervals,
        }
    }

    /// One full snapshot pass over every tracked pair.
    ///
    /// Pairs are spaced out to respect venue rate limits; per-pair failures
    /// are logged and skipped so one bad instrument cannot starve the rest.
    async fn snapshot_cycle(
        &self,
        sink: &mpsc::UnboundedSender<MarketDataMessage>,
        cancel: &CancellationToken,
    ) -> Result<(), ExchangeError> {
        for pair in &self.trading_pairs {
            if cancel.is_cancelled() {
                return Ok(());
            }
            match self.rest.order_book_snapshot(pair).await {
                Ok(snapshot) => {
                    tracing::debug!(pair = %pair, update_id = snapshot.update_id, "fetched book snapshot");
                    if sink
                        .send(MarketDataMessage::from_snapshot(pair.clone(), snapshot))
                        .is_err()
                    {
                        return Ok(());
                    }
                }
                Err(error) => {
                    tracing::warn!(pair = %pair, error = %error, "snapshot fetch failed");
                }
            }
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(self.intervals.snapshot_spacing()) => {}
            }
        }

        // Align the next full refresh to the top of the hour.
        let delay = duration_until_next_hour();
        tracing::debug!(delay_secs = delay.as_secs(), "snapshot cycle complete");
        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(delay) => {}
        }
        Ok(())
    }

    /// One websocket session: connect, subscribe, pump until it drops.
    async fn ws_session(
        &self,
        sink: &mpsc::UnboundedSender<MarketDataMessage>,
        cancel: &CancellationToken,
    ) -> Result<(), WsSessionError> {
        let (ws_stream, _response) = connect_async(&self.ws_url).await?;
        let (mut write, mut read) = ws_stream.split();
        tracing::info!(url = %self.ws_url, "market data websocket connected");

        for pair in &self.trading_pairs {
            // Depth diffs only exist on incremental venues.
            if matches!(self.mode, BookUpdateMode::Incremental) {
                let subscribe =
                    WsSubscribe::channel(ChannelKind::market_depth_channel(pair.as_str()));
                write
                    .send(Message::Text(serde_json::to_string(&subscribe)?.into()))
                    .await?;
            }
            let subscribe =
                WsSubscribe::channel(ChannelKind::market_trades_channel(pair.as_str()));
            write
                .send(Message::Text(serde_json::to_string(&subscribe)?.into()))
                .await?;
        }

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                message = read.next() => {
                    let Some(message) = message else {
                        return Err(WsSessionError::ConnectionClosed);
                    };
                    match message? {
                        Message::Text(text) => {
                            if let Err(error) = self.dispatch_frame(&text, sink) {
                                tracing::debug!(error = %error, "undecodable market frame");
                            }
                        }
                        Message::Ping(payload) => {
                            write.send(Message::Pong(payload)).await?;
                        }
                        Message::Close(_) => {
                            return Err(WsSessionError::ConnectionClosed);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn dispatch_frame(
        &self,
        text: &str,
        sink: &mpsc::UnboundedSender<MarketDataMessage>,
    ) -> Result<(), serde_json::Error> {
        let envelope: WsEnvelope = serde_json::from_str(text)?;
        match ChannelKind::parse(&envelope.result.channel) {
            Some(ChannelKind::MarketDepth { instrument }) => {
                let payload: OrderBookPayload = serde_json::from_value(envelope.result.data)?;
                let _ = sink.send(MarketDataMessage::Diff {
                    trading_pair: TradingPair::new(instrument),
                    bids: payload
                        .bids
                        .into_iter()
                        .map(|level| BookRow::new(level.price, level.volume))
                        .collect(),
                    asks: payload
                        .asks
                        .into_iter()
                        .map(|level| BookRow::new(level.price, level.volume))
                        .collect(),
                    update_id: payload.update_id,
                });
            }
            Some(ChannelKind::MarketTrades { instrument }) => {
                let trades: Vec<PublicTradePayload> =
                    serde_json::from_value(envelope.result.data)?;
                let trading_pair = TradingPair::new(instrument);
                for trade in trades {
                    let _ = sink.send(MarketDataMessage::Trade {
                        trading_pair: trading_pair.clone(),
                        trade: trade.into_market_trade(),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[async_trait]
impl MarketDataSource for OpiumMarketStream {
    async fn order_book_snapshot(
        &self,
        pair: &TradingPair,
    ) -> Result<BookSnapshot, ExchangeError> {
        self.rest.order_book_snapshot(pair).await
    }

    async fn run(
        self: Arc<Self>,
        sink: mpsc::UnboundedSender<MarketDataMessage>,
        cancel: CancellationToken,
    ) {
        let snapshot_source = Arc::clone(&self);
        let snapshot_sink = sink.clone();
        let snapshot_cancel = cancel.clone();
        let snapshots = retry_forever(
            "market-snapshots",
            ReconnectPolicy::fixed(snapshot_source.intervals.stream_retry()),
            cancel.clone(),
            move || {
                let source = Arc::clone(&snapshot_source);
                let sink = snapshot_sink.clone();
                let cancel = snapshot_cancel.clone();
                async move {
                    loop {
                        source.snapshot_cycle(&sink, &cancel).await?;
                        if cancel.is_cancelled() {
                            return Ok::<(), ExchangeError>(());
                        }
                    }
                }
            },
        );

        let ws_source = Arc::clone(&self);
        let ws_cancel = cancel.clone();
        let sessions = retry_forever(
            "market-ws",
            ReconnectPolicy::fixed(ws_source.intervals.ws_retry()),
            cancel.clone(),
            move || {
                let source = Arc::clone(&ws_source);
                let sink = sink.clone();
                let cancel = ws_cancel.clone();
                async move { source.ws_session(&sink, &cancel).await }
            },
        );

        tokio::join!(snapshots, sessions);
    }
}

/// Failures of one websocket session.
#[derive(Debug, thiserror::Error)]
pub enum WsSessionError {
    /// Underlying websocket failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Frame (de)serialization failure.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Subscription setup failed before the stream could start.
    #[error("subscription failed: {0}")]
    Subscription(String),

    /// The server closed the connection.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Time until the next top-of-hour boundary.
fn duration_until_next_hour() -> Duration {
    let now = Utc::now();
    let seconds_into_hour = u64::from(now.minute()) * 60 + u64::from(now.second());
    Duration::from_secs(3600 - seconds_into_hour.min(3599))
}
