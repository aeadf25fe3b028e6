//! End-to-end order lifecycle tests against a scripted venue.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use opium_connector::domain::order_book::BookUpdateMode;
use opium_connector::feed::{OrderBookTracker, PollCadence};
use opium_connector::{
    AccountEvent, BalanceEntry, BookSnapshot, CancelError, ChannelEventPublisher, ConnectorEvent,
    ExchangeError, ExchangePort, MarketDataMessage, MarketDataSource, OpiumExchange, OrderAck,
    OrderKind, OrderStatus, OrderStatusReport, SubmitOrderRequest, TradeReport, TradingPair,
    TradingRule, UserStreamSource,
};
use opium_connector::{ClientOrderId, ExchangeOrderId, TradeId};

const PAIR: &str = "OEX_FUT_1JAN_135.00-DAI";

/// Scripted submission outcomes, consumed in order.
enum SubmitScript {
    Ack(&'static str),
    Reject,
    Hang,
}

/// Scripted venue REST surface.
struct MockExchange {
    submits: Mutex<VecDeque<SubmitScript>>,
    cancel_failures: Mutex<HashSet<String>>,
    rest_trades: Mutex<Vec<TradeReport>>,
    rest_orders: Mutex<Vec<OrderStatusReport>>,
}

impl MockExchange {
    fn new() -> Self {
        Self {
            submits: Mutex::new(VecDeque::new()),
            cancel_failures: Mutex::new(HashSet::new()),
            rest_trades: Mutex::new(Vec::new()),
            rest_orders: Mutex::new(Vec::new()),
        }
    }

    fn script_submit(&self, script: SubmitScript) {
        self.submits.lock().push_back(script);
    }

    fn fail_cancel_of(&self, exchange_id: &str) {
        self.cancel_failures.lock().insert(exchange_id.to_string());
    }

    fn set_rest_trades(&self, trades: Vec<TradeReport>) {
        *self.rest_trades.lock() = trades;
    }
}

#[async_trait]
impl ExchangePort for MockExchange {
    async fn last_traded_price(&self, _pair: &TradingPair) -> Result<Decimal, ExchangeError> {
        Ok(dec!(14.5))
    }

    async fn order_book_snapshot(
        &self,
        _pair: &TradingPair,
    ) -> Result<BookSnapshot, ExchangeError> {
        Ok(BookSnapshot {
            bids: vec![],
            asks: vec![],
            update_id: 1,
        })
    }

    async fn trading_rules(&self) -> Result<Vec<TradingRule>, ExchangeError> {
        Ok(vec![TradingRule::from_precision(
            TradingPair::new(PAIR),
            2,
            2,
        )])
    }

    async fn submit_order(
        &self,
        _request: SubmitOrderRequest,
    ) -> Result<OrderAck, ExchangeError> {
        let script = self.submits.lock().pop_front();
        match script {
            Some(SubmitScript::Ack(id)) => Ok(OrderAck {
                exchange_order_id: ExchangeOrderId::new(id),
            }),
            Some(SubmitScript::Reject) => Err(ExchangeError::Rejected {
                reason: "rejected by venue".to_string(),
            }),
            Some(SubmitScript::Hang) | None => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn cancel_order(&self, order_id: &ExchangeOrderId) -> Result<(), ExchangeError> {
        if self.cancel_failures.lock().contains(order_id.as_str()) {
            return Err(ExchangeError::Rejected {
                reason: "cancel rejected".to_string(),
            });
        }
        Ok(())
    }

    async fn balances(&self) -> Result<Vec<BalanceEntry>, ExchangeError> {
        Ok(vec![BalanceEntry {
            asset: "DAI".to_string(),
            total: dec!(777),
            available: dec!(770),
        }])
    }

    async fn account_orders(
        &self,
        _pair: &TradingPair,
    ) -> Result<Vec<OrderStatusReport>, ExchangeError> {
        Ok(self.rest_orders.lock().clone())
    }

    async fn account_trades(
        &self,
        _pair: &TradingPair,
    ) -> Result<Vec<TradeReport>, ExchangeError> {
        Ok(self.rest_trades.lock().clone())
    }
}

/// Market data source that stays silent.
struct SilentMarketData;

#[async_trait]
impl MarketDataSource for SilentMarketData {
    async fn order_book_snapshot(
        &self,
        _pair: &TradingPair,
    ) -> Result<BookSnapshot, ExchangeError> {
        Ok(BookSnapshot {
            bids: vec![],
            asks: vec![],
            update_id: 1,
        })
    }

    async fn run(
        self: Arc<Self>,
        _sink: mpsc::UnboundedSender<MarketDataMessage>,
        cancel: CancellationToken,
    ) {
        cancel.cancelled().await;
    }
}

/// Account stream that stays silent.
struct SilentUserStream;

#[async_trait]
impl UserStreamSource for SilentUserStream {
    fn last_recv_time(&self) -> Option<Instant> {
        None
    }

    async fn run(
        self: Arc<Self>,
        _sink: mpsc::UnboundedSender<AccountEvent>,
        cancel: CancellationToken,
    ) {
        cancel.cancelled().await;
    }
}

async fn harness(
    exchange: Arc<MockExchange>,
) -> (
    Arc<OpiumExchange>,
    mpsc::UnboundedReceiver<ConnectorEvent>,
) {
    let pair = TradingPair::new(PAIR);
    let tracker = Arc::new(OrderBookTracker::new(
        std::slice::from_ref(&pair),
        Arc::new(SilentMarketData),
        BookUpdateMode::FullBook,
    ));
    let (events, event_rx) = ChannelEventPublisher::new();
    let connector = Arc::new(OpiumExchange::new(
        exchange,
        tracker,
        Arc::new(SilentUserStream),
        Arc::new(events),
        vec![pair],
        true,
        PollCadence::default(),
        Duration::from_secs(60),
    ));
    connector.update_trading_rules().await.unwrap();
    (connector, event_rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ConnectorEvent>) -> ConnectorEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

fn trade(trade_id: &str, exchange_id: &str, amount: Decimal) -> TradeReport {
    TradeReport {
        trade_id: TradeId::new(trade_id),
        exchange_order_id: ExchangeOrderId::new(exchange_id),
        price: dec!(14.5),
        amount,
        fee: dec!(0.01),
        fee_asset: "DAI".to_string(),
        traded_at: Utc::now(),
    }
}

#[tokio::test]
async fn buy_order_fills_and_completes_exactly_once() {
    let exchange = Arc::new(MockExchange::new());
    exchange.script_submit(SubmitScript::Ack("783452"));
    let (connector, mut events) = harness(Arc::clone(&exchange)).await;

    let pair = TradingPair::new(PAIR);
    let order_id = connector
        .buy(&pair, dec!(1), OrderKind::Limit, dec!(14.5))
        .unwrap();

    let ConnectorEvent::BuyOrderCreated(created) = next_event(&mut events).await else {
        panic!("expected created event");
    };
    assert_eq!(created.client_order_id, order_id);
    assert_eq!(created.price, dec!(14.5));
    assert_eq!(created.amount, dec!(1));

    connector
        .on_account_event(AccountEvent::Trade(trade("T1", "783452", dec!(1))))
        .await;

    let ConnectorEvent::OrderFilled(filled) = next_event(&mut events).await else {
        panic!("expected filled event");
    };
    assert_eq!(filled.client_order_id, order_id);
    assert_eq!(filled.amount, dec!(1));
    assert_eq!(filled.fee, dec!(0.01));
    assert_eq!(filled.trade_id.as_str(), "T1");

    let ConnectorEvent::BuyOrderCompleted(completed) = next_event(&mut events).await else {
        panic!("expected completed event");
    };
    assert_eq!(completed.executed_amount_base, dec!(1));
    assert_eq!(completed.executed_amount_quote, dec!(14.5));
    assert_eq!(completed.fee_paid, dec!(0.01));
    assert_eq!(completed.quote_asset, "DAI");

    // The order left the active set and no further events fire.
    assert_eq!(connector.in_flight_count(), 0);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn duplicate_fill_across_rest_and_push_counts_once() {
    let exchange = Arc::new(MockExchange::new());
    exchange.script_submit(SubmitScript::Ack("783452"));
    let (connector, mut events) = harness(Arc::clone(&exchange)).await;

    let pair = TradingPair::new(PAIR);
    let order_id = connector
        .buy(&pair, dec!(2), OrderKind::Limit, dec!(14.5))
        .unwrap();
    let ConnectorEvent::BuyOrderCreated(_) = next_event(&mut events).await else {
        panic!("expected created event");
    };

    // The fill arrives via the REST reconciliation poll first...
    exchange.set_rest_trades(vec![trade("T1", "783452", dec!(1))]);
    connector.update_order_status().await.unwrap();

    let ConnectorEvent::OrderFilled(filled) = next_event(&mut events).await else {
        panic!("expected filled event");
    };
    assert_eq!(filled.trade_id.as_str(), "T1");

    // ...and again via the push stream: no second event, no double count.
    connector
        .on_account_event(AccountEvent::Trade(trade("T1", "783452", dec!(1))))
        .await;
    assert!(events.try_recv().is_err());
    let order = connector.in_flight_order(&order_id).unwrap();
    assert_eq!(order.executed_amount_base, dec!(1));
    assert_eq!(order.status, OrderStatus::PartiallyFilled);

    // A genuinely new fill still completes the order.
    connector
        .on_account_event(AccountEvent::Trade(trade("T2", "783452", dec!(1))))
        .await;
    let ConnectorEvent::OrderFilled(_) = next_event(&mut events).await else {
        panic!("expected second filled event");
    };
    let ConnectorEvent::BuyOrderCompleted(completed) = next_event(&mut events).await else {
        panic!("expected completed event");
    };
    assert_eq!(completed.executed_amount_base, dec!(2));
    assert_eq!(connector.in_flight_count(), 0);
}

#[tokio::test]
async fn market_orders_are_rejected_before_any_tracking() {
    let exchange = Arc::new(MockExchange::new());
    let (connector, mut events) = harness(Arc::clone(&exchange)).await;

    let pair = TradingPair::new(PAIR);
    let error = connector
        .buy(&pair, dec!(1), OrderKind::Market, dec!(14.5))
        .unwrap_err();
    assert!(error.to_string().contains("unsupported order type"));

    assert_eq!(connector.in_flight_count(), 0);
    assert!(events.try_recv().is_err());
    // No submission was consumed from the script.
    assert!(exchange.submits.lock().is_empty());
}

#[tokio::test]
async fn below_minimum_amount_fails_before_submission() {
    let exchange = Arc::new(MockExchange::new());
    let (connector, _events) = harness(Arc::clone(&exchange)).await;

    let pair = TradingPair::new(PAIR);
    // 0.004 quantizes to 0.00, below the 0.01 minimum.
    let error = connector
        .sell(&pair, dec!(0.004), OrderKind::Limit, dec!(14.5))
        .unwrap_err();
    assert!(error.to_string().contains("below the minimum"));
    assert_eq!(connector.in_flight_count(), 0);
}

#[tokio::test]
async fn unknown_pair_fails_before_submission() {
    let exchange = Arc::new(MockExchange::new());
    let (connector, _events) = harness(Arc::clone(&exchange)).await;

    let error = connector
        .buy(
            &TradingPair::new("UNKNOWN-DAI"),
            dec!(1),
            OrderKind::Limit,
            dec!(14.5),
        )
        .unwrap_err();
    assert!(error.to_string().contains("no trading rule"));
}

#[tokio::test]
async fn rejected_submission_emits_failure_and_stops_tracking() {
    let exchange = Arc::new(MockExchange::new());
    exchange.script_submit(SubmitScript::Reject);
    let (connector, mut events) = harness(Arc::clone(&exchange)).await;

    let pair = TradingPair::new(PAIR);
    let order_id = connector
        .buy(&pair, dec!(1), OrderKind::Limit, dec!(14.5))
        .unwrap();

    let ConnectorEvent::OrderFailure(failure) = next_event(&mut events).await else {
        panic!("expected failure event");
    };
    assert_eq!(failure.client_order_id, order_id);
    assert_eq!(connector.in_flight_count(), 0);
}

#[tokio::test]
async fn cancel_without_exchange_id_times_out_instead_of_hanging() {
    let exchange = Arc::new(MockExchange::new());
    exchange.script_submit(SubmitScript::Hang);
    let (connector, _events) = harness(Arc::clone(&exchange)).await;

    let pair = TradingPair::new(PAIR);
    let order_id = connector
        .buy(&pair, dec!(1), OrderKind::Limit, dec!(14.5))
        .unwrap();

    let started = Instant::now();
    let error = connector
        .execute_cancel(&order_id, Some(Duration::from_millis(200)))
        .await
        .unwrap_err();
    assert!(matches!(error, CancelError::ExchangeIdTimeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn cancel_all_partitions_exactly_the_incomplete_orders() {
    let exchange = Arc::new(MockExchange::new());
    exchange.script_submit(SubmitScript::Ack("A1"));
    exchange.script_submit(SubmitScript::Ack("A2"));
    exchange.fail_cancel_of("A2");
    let (connector, mut events) = harness(Arc::clone(&exchange)).await;

    let pair = TradingPair::new(PAIR);
    let first = connector
        .buy(&pair, dec!(1), OrderKind::Limit, dec!(14.5))
        .unwrap();
    let second = connector
        .sell(&pair, dec!(1), OrderKind::Limit, dec!(14.6))
        .unwrap();
    // Both acknowledgements.
    for _ in 0..2 {
        let event = next_event(&mut events).await;
        assert!(matches!(
            event,
            ConnectorEvent::BuyOrderCreated(_) | ConnectorEvent::SellOrderCreated(_)
        ));
    }

    // The venue confirms the first cancellation over the push channel
    // shortly after the request goes out.
    let confirmer = Arc::clone(&connector);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        confirmer
            .on_account_event(AccountEvent::Order(OrderStatusReport {
                exchange_order_id: ExchangeOrderId::new("A1"),
                status: OrderStatus::Cancelled,
                reason: None,
            }))
            .await;
    });

    let results = connector.cancel_all(Duration::from_secs(2)).await;

    let ids: HashSet<ClientOrderId> = results.iter().map(|r| r.order_id.clone()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first));
    assert!(ids.contains(&second));

    for result in &results {
        if result.order_id == first {
            assert!(result.success, "first order should cancel: {result:?}");
        } else {
            assert!(!result.success, "second order cancel should fail");
        }
    }

    let ConnectorEvent::OrderCancelled(cancelled) = next_event(&mut events).await else {
        panic!("expected cancelled event");
    };
    assert_eq!(cancelled.client_order_id, first);
    assert_eq!(connector.in_flight_count(), 1);
}

#[tokio::test]
async fn tracking_states_survive_a_restart() {
    let exchange = Arc::new(MockExchange::new());
    exchange.script_submit(SubmitScript::Ack("783452"));
    let (connector, mut events) = harness(Arc::clone(&exchange)).await;

    let pair = TradingPair::new(PAIR);
    let order_id = connector
        .buy(&pair, dec!(2), OrderKind::Limit, dec!(14.5))
        .unwrap();
    let ConnectorEvent::BuyOrderCreated(_) = next_event(&mut events).await else {
        panic!("expected created event");
    };
    connector
        .on_account_event(AccountEvent::Trade(trade("T1", "783452", dec!(1))))
        .await;
    let _ = next_event(&mut events).await;

    let saved = connector.tracking_states();
    assert_eq!(saved.len(), 1);

    // A fresh connector picks up where the old one left off.
    let (restored, mut restored_events) = harness(Arc::clone(&exchange)).await;
    restored.restore_tracking_states(saved);
    assert_eq!(restored.in_flight_count(), 1);

    // The dedup set survived: replaying T1 is silent, T2 completes.
    restored
        .on_account_event(AccountEvent::Trade(trade("T1", "783452", dec!(1))))
        .await;
    assert!(restored_events.try_recv().is_err());

    restored
        .on_account_event(AccountEvent::Trade(trade("T2", "783452", dec!(1))))
        .await;
    let ConnectorEvent::OrderFilled(_) = next_event(&mut restored_events).await else {
        panic!("expected filled event");
    };
    let ConnectorEvent::BuyOrderCompleted(completed) =
        next_event(&mut restored_events).await
    else {
        panic!("expected completed event");
    };
    assert_eq!(completed.client_order_id, order_id);
    assert_eq!(restored.in_flight_count(), 0);
}

#[tokio::test]
async fn readiness_requires_all_components() {
    let exchange = Arc::new(MockExchange::new());
    let (connector, _events) = harness(Arc::clone(&exchange)).await;

    // Trading rules loaded, but books/balances/user stream are not ready.
    let status = connector.status();
    assert!(status.trading_rules_initialized);
    assert!(!status.order_books_initialized);
    assert!(!connector.ready());

    connector.update_balances().await.unwrap();
    assert!(connector.status().account_balance);
    assert_eq!(connector.total_balance("DAI"), dec!(777));
    assert_eq!(connector.available_balance("DAI"), dec!(770));
}
