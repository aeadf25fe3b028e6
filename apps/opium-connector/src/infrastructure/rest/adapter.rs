//! Opium REST adapter implementing `ExchangePort`.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::application::ports::{
    BalanceEntry, BookSnapshot, ExchangeError, ExchangePort, OrderAck, OrderStatusReport,
    SubmitOrderRequest, TradeReport,
};
use crate::domain::order_book::BookRow;
use crate::domain::shared::{ExchangeOrderId, TradingPair};
use crate::domain::trading_rules::TradingRule;
use crate::infrastructure::auth::AccessTokenSigner;

use super::api_types::{
    AccountsResponse, CancelResponsePayload, CreateOrderPayload, CreatedOrderPayload,
    InstrumentsResponse, OrderBookPayload, OrderPayload, TradePayload,
};
use super::client::OpiumHttpClient;

/// REST adapter for the Opium venue.
///
/// Account endpoints are authenticated with a signed access token bound to
/// the account's public key; a fresh token is generated per request.
#[derive(Debug, Clone)]
pub struct OpiumRestAdapter {
    client: OpiumHttpClient,
    signer: AccessTokenSigner,
}

impl OpiumRestAdapter {
    /// Create an adapter over an HTTP client and token signer.
    #[must_use]
    pub const fn new(client: OpiumHttpClient, signer: AccessTokenSigner) -> Self {
        Self { client, signer }
    }

    fn auth_query(&self) -> Result<String, ExchangeError> {
        let token = self
            .signer
            .access_token(Utc::now())
            .map_err(|e| ExchangeError::Validation {
                message: e.to_string(),
            })?;
        Ok(format!(
            "address={}&authToken={token}",
            self.signer.public_key()
        ))
    }
}

#[async_trait]
impl ExchangePort for OpiumRestAdapter {
    async fn last_traded_price(&self, pair: &TradingPair) -> Result<Decimal, ExchangeError> {
        let prices: HashMap<String, Decimal> = self
            .client
            .get(&format!("/tickers/last?instrument={pair}"))
            .await
            .map_err(ExchangeError::from)?;
        prices
            .get(pair.as_str())
            .copied()
            .ok_or_else(|| ExchangeError::Unknown {
                message: format!("no last price for {pair}"),
            })
    }

    async fn order_book_snapshot(
        &self,
        pair: &TradingPair,
    ) -> Result<BookSnapshot, ExchangeError> {
        let payload: OrderBookPayload = self
            .client
            .get(&format!("/orderbook?instrument={pair}"))
            .await
            .map_err(ExchangeError::from)?;
        Ok(BookSnapshot {
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
        })
    }

    async fn trading_rules(&self) -> Result<Vec<TradingRule>, ExchangeError> {
        let response: InstrumentsResponse = self
            .client
            .get("/instruments?expired=false")
            .await
            .map_err(ExchangeError::from)?;
        Ok(response
            .instruments
            .into_iter()
            .map(super::api_types::InstrumentPayload::into_trading_rule)
            .collect())
    }

    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, ExchangeError> {
        if !request.kind.is_limit_type() {
            return Err(ExchangeError::Validation {
                message: format!("unsupported order type: {}", request.kind),
            });
        }

        let payload = CreateOrderPayload {
            instrument_name: request.trading_pair.as_str().to_string(),
            side: request.side.to_string(),
            price: request.price.to_string(),
            quantity: request.amount.to_string(),
        };

        tracing::info!(
            pair = %request.trading_pair,
            side = %request.side,
            price = %request.price,
            amount = %request.amount,
            "submitting order"
        );

        let created: Vec<CreatedOrderPayload> = self
            .client
            .post("/orders", &payload)
            .await
            .map_err(ExchangeError::from)?;

        let first = created.first().ok_or_else(|| ExchangeError::Unknown {
            message: "empty create-order response".to_string(),
        })?;

        tracing::info!(exchange_order_id = %first.id, "order acknowledged");
        Ok(OrderAck {
            exchange_order_id: ExchangeOrderId::new(first.id.clone()),
        })
    }

    async fn cancel_order(&self, order_id: &ExchangeOrderId) -> Result<(), ExchangeError> {
        tracing::info!(exchange_order_id = %order_id, "cancelling order");
        let response: CancelResponsePayload = self
            .client
            .delete(&format!("/orders/{order_id}"))
            .await
            .map_err(ExchangeError::from)?;
        if response.code != 0 {
            return Err(ExchangeError::Rejected {
                reason: format!("cancel rejected with code {}", response.code),
            });
        }
        Ok(())
    }

    async fn balances(&self) -> Result<Vec<BalanceEntry>, ExchangeError> {
        let auth = self.auth_query()?;
        let response: AccountsResponse = self
            .client
            .get(&format!("/accounts/balance?{auth}"))
            .await
            .map_err(ExchangeError::from)?;
        Ok(response
            .accounts
            .into_iter()
            .map(super::api_types::AccountPayload::into_balance_entry)
            .collect())
    }

    async fn account_orders(
        &self,
        pair: &TradingPair,
    ) -> Result<Vec<OrderStatusReport>, ExchangeError> {
        let auth = self.auth_query()?;
        let orders: Vec<OrderPayload> = self
            .client
            .get(&format!("/accounts/orders?instrument={pair}&{auth}"))
            .await
            .map_err(ExchangeError::from)?;
        Ok(orders
            .into_iter()
            .filter_map(OrderPayload::into_status_report)
            .collect())
    }

    async fn account_trades(&self, pair: &TradingPair) -> Result<Vec<TradeReport>, ExchangeError> {
        let auth = self.auth_query()?;
        let trades: Vec<TradePayload> = self
            .client
            .get(&format!("/accounts/trades?instrument={pair}&{auth}"))
            .await
            .map_err(ExchangeError::from)?;
        Ok(trades.into_iter().map(TradePayload::into_trade_report).collect())
    }
}
