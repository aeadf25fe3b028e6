//! Order book tracker: one locally consistent book per tracked instrument.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{MarketDataMessage, MarketDataSource, MarketTrade};
use crate::domain::order_book::{BookRow, BookUpdateMode, BookUpdateNormalizer, OrderBook};
use crate::domain::shared::TradingPair;

/// Maintains one `OrderBook` per tracked instrument, applying data source
/// messages in sequence order.
///
/// Readiness is sticky: once every tracked pair has received a snapshot the
/// tracker stays ready, even across transient reconnects. Reconnect logic
/// lives in the data source; the tracker is agnostic to it.
pub struct OrderBookTracker {
    source: Arc<dyn MarketDataSource>,
    normalizer: BookUpdateNormalizer,
    books: HashMap<TradingPair, Arc<RwLock<OrderBook>>>,
    snapshotted: HashMap<TradingPair, AtomicBool>,
    trade_events_tx: mpsc::UnboundedSender<(TradingPair, MarketTrade)>,
    trade_events_rx: Mutex<Option<mpsc::UnboundedReceiver<(TradingPair, MarketTrade)>>>,
}

impl OrderBookTracker {
    /// Create a tracker for a fixed set of instruments.
    #[must_use]
    pub fn new(
        trading_pairs: &[TradingPair],
        source: Arc<dyn MarketDataSource>,
        mode: BookUpdateMode,
    ) -> Self {
        let books = trading_pairs
            .iter()
            .map(|pair| (pair.clone(), Arc::new(RwLock::new(OrderBook::new(pair.clone())))))
            .collect();
        let snapshotted = trading_pairs
            .iter()
            .map(|pair| (pair.clone(), AtomicBool::new(false)))
            .collect();
        let (trade_events_tx, trade_events_rx) = mpsc::unbounded_channel();
        Self {
            source,
            normalizer: BookUpdateNormalizer::new(mode),
            books,
            snapshotted,
            trade_events_tx,
            trade_events_rx: Mutex::new(Some(trade_events_rx)),
        }
    }

    /// True once every tracked pair has received at least one snapshot.
    #[must_use]
    pub fn ready(&self) -> bool {
        !self.snapshotted.is_empty()
            && self
                .snapshotted
                .values()
                .all(|seen| seen.load(Ordering::Acquire))
    }

    /// The book for an instrument, shared for read access.
    #[must_use]
    pub fn order_book(&self, pair: &TradingPair) -> Option<Arc<RwLock<OrderBook>>> {
        self.books.get(pair).cloned()
    }

    /// Take the public trade event stream. Yields once; `None` afterwards.
    #[must_use]
    pub fn take_trade_events(
        &self,
    ) -> Option<mpsc::UnboundedReceiver<(TradingPair, MarketTrade)>> {
        self.trade_events_rx.lock().take()
    }

    /// Start the data source and the listener tasks.
    ///
    /// Spawns the source pump plus three listeners (snapshots, diffs,
    /// trades); all stop when `cancel` fires.
    pub fn start(self: &Arc<Self>, cancel: &CancellationToken) {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel();
        let (diff_tx, mut diff_rx) = mpsc::unbounded_channel();
        let (trade_tx, mut trade_rx) = mpsc::unbounded_channel();

        tokio::spawn(Arc::clone(&self.source).run(raw_tx, cancel.clone()));

        // Router: fan the unified source stream out per message kind.
        let router_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = router_cancel.cancelled() => break,
                    message = raw_rx.recv() => {
                        let Some(message) = message else { break };
                        let result = match message {
                            MarketDataMessage::Snapshot { .. } => snapshot_tx.send(message),
                            MarketDataMessage::Diff { .. } => diff_tx.send(message),
                            MarketDataMessage::Trade { .. } => trade_tx.send(message),
                        };
                        if result.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let tracker = Arc::clone(self);
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = task_cancel.cancelled() => break,
                    message = snapshot_rx.recv() => {
                        let Some(message) = message else { break };
                        tracker.on_snapshot(message);
                    }
                }
            }
        });

        let tracker = Arc::clone(self);
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = task_cancel.cancelled() => break,
                    message = diff_rx.recv() => {
                        let Some(message) = message else { break };
                        tracker.on_diff(message);
                    }
                }
            }
        });

        let tracker = Arc::clone(self);
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = task_cancel.cancelled() => break,
                    message = trade_rx.recv() => {
                        let Some(message) = message else { break };
                        tracker.on_trade(message);
                    }
                }
            }
        });
    }

    fn on_snapshot(&self, message: MarketDataMessage) {
        let MarketDataMessage::Snapshot {
            trading_pair,
            bids,
            asks,
            update_id,
        } = message
        else {
            return;
        };
        self.apply_snapshot(&trading_pair, bids, asks, update_id);
    }

    fn on_diff(&self, message: MarketDataMessage) {
        let MarketDataMessage::Diff {
            trading_pair,
            bids,
            asks,
            update_id,
        } = message
        else {
            return;
        };
        // Full-book venues label complete books as diffs; applying them
        // through the diff path would never remove vanished levels.
        if self.normalizer.routes_to_snapshot() {
            self.apply_snapshot(&trading_pair, bids, asks, update_id);
            return;
        }
        let Some(book) = self.books.get(&trading_pair) else {
            tracing::debug!(pair = %trading_pair, "diff for untracked pair");
            return;
        };
        let update = self.normalizer.normalize(bids, asks, update_id);
        let applied =
            book.write()
                .apply_diff(&update.bids, &update.asks, update.update_id);
        if !applied {
            tracing::trace!(
                pair = %trading_pair,
                update_id,
                "dropped stale book diff"
            );
        }
    }

    fn on_trade(&self, message: MarketDataMessage) {
        let MarketDataMessage::Trade {
            trading_pair,
            trade,
        } = message
        else {
            return;
        };
        if let Some(book) = self.books.get(&trading_pair) {
            book.write().record_trade(trade.price);
        }
        let _ = self.trade_events_tx.send((trading_pair, trade));
    }

    fn apply_snapshot(
        &self,
        trading_pair: &TradingPair,
        bids: Vec<BookRow>,
        asks: Vec<BookRow>,
        update_id: u64,
    ) {
        let Some(book) = self.books.get(trading_pair) else {
            tracing::debug!(pair = %trading_pair, "snapshot for untracked pair");
            return;
        };
        let update = self.normalizer.normalize(bids, asks, update_id);
        book.write()
            .apply_snapshot(&update.bids, &update.asks, update.update_id);
        if let Some(seen) = self.snapshotted.get(trading_pair) {
            if !seen.swap(true, Ordering::AcqRel) {
                tracing::info!(pair = %trading_pair, update_id, "order book warmed up");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{BookSnapshot, ExchangeError};
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    /// Source that replays a scripted message sequence.
    struct ScriptedSource {
        messages: Vec<MarketDataMessage>,
    }

    #[async_trait]
    impl MarketDataSource for ScriptedSource {
        async fn order_book_snapshot(
            &self,
            _pair: &TradingPair,
        ) -> Result<BookSnapshot, ExchangeError> {
            Err(ExchangeError::Unknown {
                message: "not used".to_string(),
            })
        }

        async fn run(
            self: Arc<Self>,
            sink: mpsc::UnboundedSender<MarketDataMessage>,
            _cancel: CancellationToken,
        ) {
            for message in &self.messages {
                let _ = sink.send(message.clone());
            }
        }
    }

    fn pair() -> TradingPair {
        TradingPair::new("OEX_FUT_1JAN_135.00-DAI")
    }

    fn snapshot_message(update_id: u64, bid: rust_decimal::Decimal) -> MarketDataMessage {
        MarketDataMessage::Snapshot {
            trading_pair: pair(),
            bids: vec![BookRow::new(bid, dec!(1))],
            asks: vec![],
            update_id,
        }
    }

    async fn wait_until(deadline: Duration, predicate: impl Fn() -> bool) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < deadline {
            if predicate() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        predicate()
    }

    #[tokio::test]
    async fn becomes_ready_after_snapshot() {
        let source = Arc::new(ScriptedSource {
            messages: vec![snapshot_message(100, dec!(14.4))],
        });
        let tracker = Arc::new(OrderBookTracker::new(
            &[pair()],
            source,
            BookUpdateMode::Incremental,
        ));
        assert!(!tracker.ready());

        let cancel = CancellationToken::new();
        tracker.start(&cancel);

        let tracker_ref = Arc::clone(&tracker);
        assert!(wait_until(Duration::from_secs(2), move || tracker_ref.ready()).await);
        let book = tracker.order_book(&pair()).unwrap();
        assert_eq!(book.read().best_bid().unwrap().price, dec!(14.4));
        cancel.cancel();
    }

    #[tokio::test]
    async fn stale_diff_leaves_book_unchanged() {
        let source = Arc::new(ScriptedSource {
            messages: vec![
                snapshot_message(100, dec!(14.4)),
                MarketDataMessage::Diff {
                    trading_pair: pair(),
                    bids: vec![BookRow::new(dec!(9.9), dec!(1))],
                    asks: vec![],
                    update_id: 99,
                },
            ],
        });
        let tracker = Arc::new(OrderBookTracker::new(
            &[pair()],
            source,
            BookUpdateMode::Incremental,
        ));
        let cancel = CancellationToken::new();
        tracker.start(&cancel);

        let tracker_ref = Arc::clone(&tracker);
        assert!(wait_until(Duration::from_secs(2), move || tracker_ref.ready()).await);
        // Give the diff listener a moment to (not) apply the stale diff.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let book = tracker.order_book(&pair()).unwrap();
        assert_eq!(book.read().best_bid().unwrap().price, dec!(14.4));
        assert_eq!(book.read().update_id(), 100);
        cancel.cancel();
    }

    #[tokio::test]
    async fn full_book_mode_routes_diffs_to_snapshot() {
        let source = Arc::new(ScriptedSource {
            messages: vec![
                snapshot_message(100, dec!(14.4)),
                MarketDataMessage::Diff {
                    trading_pair: pair(),
                    bids: vec![BookRow::new(dec!(14.5), dec!(2))],
                    asks: vec![],
                    update_id: 101,
                },
            ],
        });
        let tracker = Arc::new(OrderBookTracker::new(
            &[pair()],
            source,
            BookUpdateMode::FullBook,
        ));
        let cancel = CancellationToken::new();
        tracker.start(&cancel);

        let tracker_ref = Arc::clone(&tracker);
        let applied = wait_until(Duration::from_secs(2), move || {
            tracker_ref
                .order_book(&pair())
                .is_some_and(|book| book.read().update_id() == 101)
        })
        .await;
        assert!(applied);

        // The push replaced the ladder wholesale: the old level is gone.
        let book = tracker.order_book(&pair()).unwrap();
        assert_eq!(book.read().bid_depth(), 1);
        assert_eq!(book.read().best_bid().unwrap().price, dec!(14.5));
        cancel.cancel();
    }

    #[tokio::test]
    async fn trades_update_last_price_and_forward() {
        let source = Arc::new(ScriptedSource {
            messages: vec![MarketDataMessage::Trade {
                trading_pair: pair(),
                trade: MarketTrade {
                    price: dec!(14.55),
                    amount: dec!(1),
                    trade_id: None,
                    traded_at: Utc::now(),
                },
            }],
        });
        let tracker = Arc::new(OrderBookTracker::new(
            &[pair()],
            source,
            BookUpdateMode::Incremental,
        ));
        let mut trades = tracker.take_trade_events().unwrap();
        assert!(tracker.take_trade_events().is_none());

        let cancel = CancellationToken::new();
        tracker.start(&cancel);

        let (trade_pair, trade) = trades.recv().await.unwrap();
        assert_eq!(trade_pair, pair());
        assert_eq!(trade.price, dec!(14.55));

        let tracker_ref = Arc::clone(&tracker);
        assert!(
            wait_until(Duration::from_secs(2), move || {
                tracker_ref
                    .order_book(&pair())
                    .is_some_and(|book| book.read().last_trade_price() == Some(dec!(14.55)))
            })
            .await
        );
        cancel.cancel();
    }
}
