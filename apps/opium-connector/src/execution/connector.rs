//! The Opium exchange connector.
//!
//! Owns the in-flight order set, balances, and trading rules; exposes
//! buy/sell/cancel; and reconciles REST polling with push-stream events.
//! Push updates are the primary path, REST is the consistency backstop,
//! and fill deduplication by venue trade id makes the merge safe in both
//! directions.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    AccountEvent, BalanceEntry, EventPublisherPort, ExchangeError, ExchangePort,
    OrderStatusReport, SubmitOrderRequest, TradeReport, UserStreamSource,
};
use crate::domain::order_book::OrderBook;
use crate::domain::order_tracking::{
    ConnectorEvent, Fill, FillOutcome, InFlightOrder, OrderCancelled, OrderCompleted,
    OrderCreated, OrderFailure, OrderFilled, OrderKind, OrderStatus, TradeSide,
};
use crate::domain::shared::{ClientOrderId, ExchangeOrderId, TradingPair};
use crate::domain::trading_rules::TradingRule;
use crate::feed::{OrderBookTracker, PollCadence};
use crate::infrastructure::retry::retry_forever;
use crate::infrastructure::websocket::ReconnectPolicy;

use super::types::{CancelError, CancellationResult, ConnectorStatus, OrderValidationError};

/// Budget for resolving an exchange order id when no caller timeout is given.
const API_CALL_TIMEOUT: Duration = Duration::from_secs(10);
/// Backoff after a failed poll/refresh iteration.
const LOOP_RETRY_BACKOFF: Duration = Duration::from_millis(500);
/// Terminal orders remembered after removal from the active set.
const FINISHED_ORDER_MEMORY: usize = 256;

/// Exchange connector for the Opium venue.
pub struct OpiumExchange {
    exchange: Arc<dyn ExchangePort>,
    tracker: Arc<OrderBookTracker>,
    user_stream: Arc<dyn UserStreamSource>,
    events: Arc<dyn EventPublisherPort>,
    trading_pairs: Vec<TradingPair>,
    trading_required: bool,
    cadence: PollCadence,
    trading_rules_interval: Duration,

    in_flight: RwLock<HashMap<ClientOrderId, InFlightOrder>>,
    order_ids: RwLock<HashMap<ExchangeOrderId, ClientOrderId>>,
    balances: RwLock<HashMap<String, BalanceEntry>>,
    trading_rules: RwLock<HashMap<TradingPair, TradingRule>>,
    /// Terminal states of recently removed orders, for waiters that race
    /// the removal.
    recently_finished: Mutex<VecDeque<(ClientOrderId, OrderStatus)>>,

    /// Woken on any in-flight order mutation; waiters re-check their
    /// predicate.
    order_updated: Notify,
    /// Raised by `tick` when the reconciliation poll is due.
    poll_notify: Notify,
    last_tick_secs: AtomicU64,
}

impl OpiumExchange {
    /// Create a connector.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exchange: Arc<dyn ExchangePort>,
        tracker: Arc<OrderBookTracker>,
        user_stream: Arc<dyn UserStreamSource>,
        events: Arc<dyn EventPublisherPort>,
        trading_pairs: Vec<TradingPair>,
        trading_required: bool,
        cadence: PollCadence,
        trading_rules_interval: Duration,
    ) -> Self {
        Self {
            exchange,
            tracker,
            user_stream,
            events,
            trading_pairs,
            trading_required,
            cadence,
            trading_rules_interval,
            in_flight: RwLock::new(HashMap::new()),
            order_ids: RwLock::new(HashMap::new()),
            balances: RwLock::new(HashMap::new()),
            trading_rules: RwLock::new(HashMap::new()),
            recently_finished: Mutex::new(VecDeque::new()),
            order_updated: Notify::new(),
            poll_notify: Notify::new(),
            last_tick_secs: AtomicU64::new(0),
        }
    }

    // ------------------------------------------------------------------
    // Readiness
    // ------------------------------------------------------------------

    /// Per-component readiness.
    #[must_use]
    pub fn status(&self) -> ConnectorStatus {
        ConnectorStatus {
            order_books_initialized: self.tracker.ready(),
            account_balance: !self.trading_required || !self.balances.read().is_empty(),
            trading_rules_initialized: !self.trading_rules.read().is_empty(),
            user_stream_initialized: !self.trading_required
                || self.user_stream.last_recv_time().is_some(),
        }
    }

    /// True when every component has converged.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.status().ready()
    }

    // ------------------------------------------------------------------
    // State access
    // ------------------------------------------------------------------

    /// The tracked order book for an instrument.
    #[must_use]
    pub fn order_book(&self, pair: &TradingPair) -> Option<Arc<RwLock<OrderBook>>> {
        self.tracker.order_book(pair)
    }

    /// Last traded price from the venue ticker.
    pub async fn last_traded_price(&self, pair: &TradingPair) -> Result<Decimal, ExchangeError> {
        self.exchange.last_traded_price(pair).await
    }

    /// Total balance of an asset.
    #[must_use]
    pub fn total_balance(&self, asset: &str) -> Decimal {
        self.balances
            .read()
            .get(asset)
            .map_or(Decimal::ZERO, |entry| entry.total)
    }

    /// Available (unencumbered) balance of an asset.
    #[must_use]
    pub fn available_balance(&self, asset: &str) -> Decimal {
        self.balances
            .read()
            .get(asset)
            .map_or(Decimal::ZERO, |entry| entry.available)
    }

    /// Snapshot of one tracked order.
    #[must_use]
    pub fn in_flight_order(&self, order_id: &ClientOrderId) -> Option<InFlightOrder> {
        self.in_flight.read().get(order_id).cloned()
    }

    /// Number of orders currently tracked.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.read().len()
    }

    /// Serializable snapshot of every non-terminal order, for restart
    /// recovery.
    #[must_use]
    pub fn tracking_states(&self) -> HashMap<ClientOrderId, InFlightOrder> {
        self.in_flight
            .read()
            .iter()
            .filter(|(_, order)| !order.is_done())
            .map(|(id, order)| (id.clone(), order.clone()))
            .collect()
    }

    /// Restore orders saved by `tracking_states`.
    pub fn restore_tracking_states(&self, saved: HashMap<ClientOrderId, InFlightOrder>) {
        let mut orders = self.in_flight.write();
        let mut ids = self.order_ids.write();
        for (client_id, order) in saved {
            if let Some(exchange_id) = &order.exchange_order_id {
                ids.insert(exchange_id.clone(), client_id.clone());
            }
            orders.insert(client_id, order);
        }
    }

    // ------------------------------------------------------------------
    // Order entry
    // ------------------------------------------------------------------

    /// Submit a buy order. Returns the local order id immediately; the
    /// exchange submission runs as a background task.
    pub fn buy(
        self: &Arc<Self>,
        pair: &TradingPair,
        amount: Decimal,
        kind: OrderKind,
        price: Decimal,
    ) -> Result<ClientOrderId, OrderValidationError> {
        self.place_order(TradeSide::Buy, pair, amount, kind, price)
    }

    /// Submit a sell order. Returns the local order id immediately; the
    /// exchange submission runs as a background task.
    pub fn sell(
        self: &Arc<Self>,
        pair: &TradingPair,
        amount: Decimal,
        kind: OrderKind,
        price: Decimal,
    ) -> Result<ClientOrderId, OrderValidationError> {
        self.place_order(TradeSide::Sell, pair, amount, kind, price)
    }

    fn place_order(
        self: &Arc<Self>,
        side: TradeSide,
        pair: &TradingPair,
        amount: Decimal,
        kind: OrderKind,
        price: Decimal,
    ) -> Result<ClientOrderId, OrderValidationError> {
        // Market orders fail before any tracking or network activity.
        if !kind.is_limit_type() {
            return Err(OrderValidationError::UnsupportedOrderType { kind });
        }
        let rule = self.trading_rules.read().get(pair).cloned().ok_or_else(|| {
            OrderValidationError::MissingTradingRule {
                trading_pair: pair.clone(),
            }
        })?;

        let price = rule.quantize_price(price);
        let amount = rule.quantize_amount(amount);
        if amount < rule.min_order_size {
            return Err(OrderValidationError::BelowMinimumSize {
                amount,
                minimum: rule.min_order_size,
            });
        }

        let order_id = ClientOrderId::generate(side.tag());
        let order = InFlightOrder::new(
            order_id.clone(),
            pair.clone(),
            side,
            kind,
            price,
            amount,
        );
        self.in_flight.write().insert(order_id.clone(), order);

        let connector = Arc::clone(self);
        let task_order_id = order_id.clone();
        let task_pair = pair.clone();
        tokio::spawn(async move {
            connector
                .submit_order_task(task_order_id, task_pair, side, kind, price, amount)
                .await;
        });

        Ok(order_id)
    }

    async fn submit_order_task(
        &self,
        order_id: ClientOrderId,
        pair: TradingPair,
        side: TradeSide,
        kind: OrderKind,
        price: Decimal,
        amount: Decimal,
    ) {
        let request = SubmitOrderRequest {
            trading_pair: pair.clone(),
            side,
            kind,
            price,
            amount,
        };

        match self.exchange.submit_order(request).await {
            Ok(ack) => {
                let tracked = {
                    let mut orders = self.in_flight.write();
                    orders.get_mut(&order_id).map(|order| {
                        order.set_exchange_order_id(ack.exchange_order_id.clone());
                    })
                };
                if tracked.is_none() {
                    // Stopped while the request was in flight.
                    tracing::warn!(order_id = %order_id, "ack for an order no longer tracked");
                    return;
                }
                self.order_ids
                    .write()
                    .insert(ack.exchange_order_id.clone(), order_id.clone());
                self.order_updated.notify_waiters();

                tracing::info!(
                    order_id = %order_id,
                    exchange_order_id = %ack.exchange_order_id,
                    pair = %pair,
                    side = %side,
                    %amount,
                    %price,
                    "created order"
                );
                let created = OrderCreated {
                    timestamp: Utc::now(),
                    kind,
                    trading_pair: pair,
                    amount,
                    price,
                    client_order_id: order_id,
                };
                let event = match side {
                    TradeSide::Buy => ConnectorEvent::BuyOrderCreated(created),
                    TradeSide::Sell => ConnectorEvent::SellOrderCreated(created),
                };
                self.events.publish(event).await;
            }
            Err(error) => {
                tracing::warn!(
                    order_id = %order_id,
                    pair = %pair,
                    side = %side,
                    error = %error,
                    "order submission failed"
                );
                self.remove_order(&order_id, OrderStatus::Failed);
                self.events
                    .publish(ConnectorEvent::OrderFailure(OrderFailure {
                        timestamp: Utc::now(),
                        client_order_id: order_id,
                        kind,
                    }))
                    .await;
            }
        }
    }

    // ------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------

    /// Request cancellation of an order. Returns immediately; listen for
    /// the order-cancelled event for the outcome.
    pub fn cancel(self: &Arc<Self>, pair: &TradingPair, order_id: &ClientOrderId) {
        let connector = Arc::clone(self);
        let order_id = order_id.clone();
        let pair = pair.clone();
        tokio::spawn(async move {
            if let Err(error) = connector.execute_cancel(&order_id, None).await {
                tracing::warn!(order_id = %order_id, pair = %pair, error = %error, "cancel failed");
            }
        });
    }

    /// Cancel one order, optionally waiting for the venue to confirm.
    ///
    /// The exchange-id wait is bounded by the caller's timeout (or a
    /// default API budget), and abandoned early when the order reaches a
    /// terminal state first, so a submission that never completes cannot
    /// hang the caller.
    pub async fn execute_cancel(
        &self,
        order_id: &ClientOrderId,
        wait_for_confirmation: Option<Duration>,
    ) -> Result<ClientOrderId, CancelError> {
        let id_budget = wait_for_confirmation.unwrap_or(API_CALL_TIMEOUT);
        let exchange_id = self.wait_for_exchange_order_id(order_id, id_budget).await?;

        self.exchange
            .cancel_order(&exchange_id)
            .await
            .map_err(|error| CancelError::Exchange {
                message: error.to_string(),
            })?;

        if let Some(timeout) = wait_for_confirmation {
            self.wait_for_cancellation(order_id, timeout).await?;
        }
        Ok(order_id.clone())
    }

    /// Cancel every non-terminal order and collect per-order outcomes.
    ///
    /// The returned set covers exactly the orders that were incomplete at
    /// call time: confirmed cancels as successes, everything else
    /// (timeouts included) as failures. Nothing is retried automatically.
    pub async fn cancel_all(&self, timeout: Duration) -> Vec<CancellationResult> {
        let incomplete: Vec<ClientOrderId> = self
            .in_flight
            .read()
            .iter()
            .filter(|(_, order)| !order.is_done())
            .map(|(id, _)| id.clone())
            .collect();

        let attempts = incomplete
            .iter()
            .map(|order_id| self.execute_cancel(order_id, Some(timeout)));
        let outcome = tokio::time::timeout(timeout, futures::future::join_all(attempts)).await;

        let mut results = Vec::with_capacity(incomplete.len());
        let mut pending: HashSet<ClientOrderId> = incomplete.into_iter().collect();

        if let Ok(attempt_results) = outcome {
            for attempt in attempt_results {
                match attempt {
                    Ok(order_id) => {
                        if pending.remove(&order_id) {
                            results.push(CancellationResult::succeeded(order_id));
                        }
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "cancel_all attempt failed");
                    }
                }
            }
        } else {
            tracing::warn!(timeout_secs = timeout.as_secs(), "cancel_all timed out");
        }

        for order_id in pending {
            results.push(CancellationResult::failed(
                order_id,
                "cancellation not confirmed within timeout".to_string(),
            ));
        }
        results
    }

    /// Wait until the order has a venue id, it goes terminal, or the
    /// budget runs out.
    async fn wait_for_exchange_order_id(
        &self,
        order_id: &ClientOrderId,
        budget: Duration,
    ) -> Result<ExchangeOrderId, CancelError> {
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            let notified = self.order_updated.notified();
            {
                let orders = self.in_flight.read();
                match orders.get(order_id) {
                    Some(order) => {
                        if let Some(exchange_id) = &order.exchange_order_id {
                            return Ok(exchange_id.clone());
                        }
                        if order.is_done() {
                            return Err(CancelError::AlreadyTerminal {
                                order_id: order_id.clone(),
                                status: order.status,
                            });
                        }
                    }
                    None => {
                        return Err(self.finished_state(order_id).map_or_else(
                            || CancelError::OrderNotFound {
                                order_id: order_id.clone(),
                            },
                            |status| CancelError::AlreadyTerminal {
                                order_id: order_id.clone(),
                                status,
                            },
                        ));
                    }
                }
            }
            tokio::select! {
                () = notified => {}
                () = tokio::time::sleep_until(deadline) => {
                    return Err(CancelError::ExchangeIdTimeout {
                        order_id: order_id.clone(),
                    });
                }
            }
        }
    }

    /// Wait until the order is confirmed cancelled or the budget runs out.
    async fn wait_for_cancellation(
        &self,
        order_id: &ClientOrderId,
        budget: Duration,
    ) -> Result<(), CancelError> {
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            let notified = self.order_updated.notified();
            {
                let orders = self.in_flight.read();
                match orders.get(order_id) {
                    Some(order) if order.status == OrderStatus::Cancelled => return Ok(()),
                    Some(order) if order.is_done() => {
                        return Err(CancelError::AlreadyTerminal {
                            order_id: order_id.clone(),
                            status: order.status,
                        });
                    }
                    Some(_) => {}
                    None => {
                        return match self.finished_state(order_id) {
                            Some(OrderStatus::Cancelled) => Ok(()),
                            Some(status) => Err(CancelError::AlreadyTerminal {
                                order_id: order_id.clone(),
                                status,
                            }),
                            None => Err(CancelError::OrderNotFound {
                                order_id: order_id.clone(),
                            }),
                        };
                    }
                }
            }
            tokio::select! {
                () = notified => {}
                () = tokio::time::sleep_until(deadline) => {
                    return Err(CancelError::ConfirmationTimeout {
                        order_id: order_id.clone(),
                    });
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Clock hook: decides whether the reconciliation poll is due.
    ///
    /// Polling accelerates to the short interval when the account stream
    /// has been silent past the liveness threshold.
    pub fn tick(&self, timestamp_secs: u64) {
        let silence = self
            .user_stream
            .last_recv_time()
            .map(|instant| instant.elapsed());
        let interval = self.cadence.poll_interval(silence);
        let last = self.last_tick_secs.swap(timestamp_secs, Ordering::AcqRel);
        if PollCadence::crossed_boundary(interval, last, timestamp_secs) {
            self.poll_notify.notify_one();
        }
    }

    /// Refresh the trading-rule table wholesale.
    pub async fn update_trading_rules(&self) -> Result<(), ExchangeError> {
        let rules = self.exchange.trading_rules().await?;
        let table: HashMap<TradingPair, TradingRule> = rules
            .into_iter()
            .map(|rule| (rule.trading_pair.clone(), rule))
            .collect();
        tracing::debug!(count = table.len(), "trading rules refreshed");
        *self.trading_rules.write() = table;
        Ok(())
    }

    /// Refresh balances from REST, pruning assets the venue stopped
    /// reporting.
    pub async fn update_balances(&self) -> Result<(), ExchangeError> {
        let entries = self.exchange.balances().await?;
        let mut balances = self.balances.write();
        let fresh: HashMap<String, BalanceEntry> = entries
            .into_iter()
            .map(|entry| (entry.asset.clone(), entry))
            .collect();
        *balances = fresh;
        Ok(())
    }

    /// Reconcile order statuses and fills via REST.
    ///
    /// Runs the same processing paths as the push stream, so a fill seen
    /// on both sides is counted once.
    pub async fn update_order_status(&self) -> Result<(), ExchangeError> {
        if self.in_flight.read().is_empty() {
            return Ok(());
        }
        for pair in &self.trading_pairs {
            let (orders, trades) = tokio::join!(
                self.exchange.account_orders(pair),
                self.exchange.account_trades(pair)
            );
            for trade in trades? {
                self.process_trade_message(trade).await;
            }
            for order in orders? {
                self.process_order_message(order).await;
            }
        }
        Ok(())
    }

    /// Apply one account event from the push stream.
    pub async fn on_account_event(&self, event: AccountEvent) {
        match event {
            AccountEvent::Order(report) => self.process_order_message(report).await,
            AccountEvent::Trade(report) => self.process_trade_message(report).await,
            AccountEvent::Balance(entries) => {
                let mut balances = self.balances.write();
                for entry in entries {
                    balances.insert(entry.asset.clone(), entry);
                }
            }
        }
    }

    /// Apply an order status report from either REST or the push stream.
    async fn process_order_message(&self, report: OrderStatusReport) {
        let Some(client_id) = self.client_id_for(&report.exchange_order_id) else {
            return;
        };

        let mut event = None;
        {
            let mut orders = self.in_flight.write();
            let Some(order) = orders.get_mut(&client_id) else {
                return;
            };
            match report.status {
                OrderStatus::Cancelled => {
                    if order.transition_to(OrderStatus::Cancelled) {
                        tracing::info!(order_id = %client_id, "order cancelled");
                        event = Some(ConnectorEvent::OrderCancelled(OrderCancelled {
                            timestamp: Utc::now(),
                            client_order_id: client_id.clone(),
                        }));
                    }
                }
                OrderStatus::Failed => {
                    if order.transition_to(OrderStatus::Failed) {
                        tracing::warn!(
                            order_id = %client_id,
                            reason = report.reason.as_deref().unwrap_or("unspecified"),
                            "order failed"
                        );
                        event = Some(ConnectorEvent::OrderFailure(OrderFailure {
                            timestamp: Utc::now(),
                            client_order_id: client_id.clone(),
                            kind: order.kind,
                        }));
                    }
                }
                OrderStatus::Open | OrderStatus::PartiallyFilled => {
                    let _ = order.transition_to(report.status);
                }
                // Completion is driven by fill messages so the executed
                // amounts and completion event stay consistent; a FILLED
                // status here would preempt fills still in flight.
                OrderStatus::PendingCreate | OrderStatus::Filled => {}
            }
        }

        if let Some(event) = event {
            self.remove_order(&client_id, report.status);
            self.events.publish(event).await;
        } else {
            self.order_updated.notify_waiters();
        }
    }

    /// Apply a fill report from either REST or the push stream.
    async fn process_trade_message(&self, report: TradeReport) {
        let Some(client_id) = self.client_id_for(&report.exchange_order_id) else {
            return;
        };
        let fill = Fill {
            trade_id: report.trade_id.clone(),
            price: report.price,
            amount: report.amount,
            fee: report.fee,
            fee_asset: report.fee_asset.clone(),
        };

        let mut events = Vec::new();
        let mut completed = false;
        {
            let mut orders = self.in_flight.write();
            let Some(order) = orders.get_mut(&client_id) else {
                return;
            };
            let outcome = order.apply_fill(&fill);
            if matches!(outcome, FillOutcome::Applied | FillOutcome::Completed) {
                events.push(ConnectorEvent::OrderFilled(OrderFilled {
                    timestamp: Utc::now(),
                    client_order_id: client_id.clone(),
                    trading_pair: order.trading_pair.clone(),
                    side: order.side,
                    kind: order.kind,
                    price: report.price,
                    amount: report.amount,
                    fee: report.fee,
                    fee_asset: report.fee_asset.clone(),
                    trade_id: report.trade_id.clone(),
                }));
            }
            if matches!(outcome, FillOutcome::Completed) {
                completed = true;
                tracing::info!(
                    order_id = %client_id,
                    side = %order.side,
                    executed = %order.executed_amount_base,
                    "order completed"
                );
                let done = OrderCompleted {
                    timestamp: Utc::now(),
                    client_order_id: client_id.clone(),
                    base_asset: order.trading_pair.base().to_string(),
                    quote_asset: order
                        .trading_pair
                        .quote()
                        .unwrap_or_default()
                        .to_string(),
                    executed_amount_base: order.executed_amount_base,
                    executed_amount_quote: order.executed_amount_quote,
                    fee_paid: order.fee_paid,
                    fee_asset: order.fee_asset.clone(),
                    kind: order.kind,
                };
                events.push(match order.side {
                    TradeSide::Buy => ConnectorEvent::BuyOrderCompleted(done),
                    TradeSide::Sell => ConnectorEvent::SellOrderCompleted(done),
                });
            }
        }

        if completed {
            self.remove_order(&client_id, OrderStatus::Filled);
        } else if !events.is_empty() {
            self.order_updated.notify_waiters();
        }
        for event in events {
            self.events.publish(event).await;
        }
    }

    fn client_id_for(&self, exchange_id: &ExchangeOrderId) -> Option<ClientOrderId> {
        if let Some(client_id) = self.order_ids.read().get(exchange_id) {
            return Some(client_id.clone());
        }
        // A REST poll can race the submission ack; fall back to a scan.
        self.in_flight
            .read()
            .values()
            .find(|order| order.exchange_order_id.as_ref() == Some(exchange_id))
            .map(|order| order.client_order_id.clone())
    }

    /// Drop an order from the active set, remembering its terminal state.
    fn remove_order(&self, order_id: &ClientOrderId, status: OrderStatus) {
        let removed = self.in_flight.write().remove(order_id);
        if let Some(order) = &removed {
            if let Some(exchange_id) = &order.exchange_order_id {
                self.order_ids.write().remove(exchange_id);
            }
        }
        let mut finished = self.recently_finished.lock();
        if finished.len() >= FINISHED_ORDER_MEMORY {
            finished.pop_front();
        }
        finished.push_back((order_id.clone(), status));
        drop(finished);
        self.order_updated.notify_waiters();
    }

    fn finished_state(&self, order_id: &ClientOrderId) -> Option<OrderStatus> {
        self.recently_finished
            .lock()
            .iter()
            .rev()
            .find(|(id, _)| id == order_id)
            .map(|(_, status)| *status)
    }

    // ------------------------------------------------------------------
    // Background tasks
    // ------------------------------------------------------------------

    /// Start the tracker and the connector's polling/listener tasks.
    ///
    /// All tasks stop when `cancel` fires.
    pub fn start(self: &Arc<Self>, cancel: &CancellationToken) {
        self.tracker.start(cancel);

        // Trading-rule refresh loop.
        let connector = Arc::clone(self);
        let token = cancel.clone();
        tokio::spawn(async move {
            let loop_cancel = token.clone();
            retry_forever(
                "trading-rules",
                ReconnectPolicy::fixed(LOOP_RETRY_BACKOFF),
                token,
                move || {
                    let connector = Arc::clone(&connector);
                    let cancel = loop_cancel.clone();
                    async move {
                        loop {
                            connector.update_trading_rules().await?;
                            tokio::select! {
                                () = cancel.cancelled() => return Ok::<(), ExchangeError>(()),
                                () = tokio::time::sleep(connector.trading_rules_interval) => {}
                            }
                        }
                    }
                },
            )
            .await;
        });

        if !self.trading_required {
            return;
        }

        // Account push stream plus its event listener.
        let (account_tx, mut account_rx) = mpsc::unbounded_channel();
        tokio::spawn(Arc::clone(&self.user_stream).run(account_tx, cancel.clone()));

        let connector = Arc::clone(self);
        let token = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    event = account_rx.recv() => {
                        let Some(event) = event else { break };
                        connector.on_account_event(event).await;
                    }
                }
            }
        });

        // REST reconciliation loop, gated on the poll notifier.
        let connector = Arc::clone(self);
        let token = cancel.clone();
        tokio::spawn(async move {
            let loop_cancel = token.clone();
            retry_forever(
                "status-poll",
                ReconnectPolicy::fixed(LOOP_RETRY_BACKOFF),
                token,
                move || {
                    let connector = Arc::clone(&connector);
                    let cancel = loop_cancel.clone();
                    async move {
                        loop {
                            tokio::select! {
                                () = cancel.cancelled() => return Ok::<(), ExchangeError>(()),
                                () = connector.poll_notify.notified() => {}
                            }
                            let (balances, orders) = tokio::join!(
                                connector.update_balances(),
                                connector.update_order_status()
                            );
                            balances?;
                            orders?;
                        }
                    }
                },
            )
            .await;
        });
    }
}
