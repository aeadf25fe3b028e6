//! Opium connector binary.
//!
//! Wires the REST adapter, stream sources, tracker, and connector, then
//! drives the reconciliation clock until ctrl-c. On shutdown, outstanding
//! orders are cancelled before the process exits.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use opium_connector::feed::{OrderBookTracker, PollCadence};
use opium_connector::infrastructure::auth::AccessTokenSigner;
use opium_connector::infrastructure::config::Settings;
use opium_connector::infrastructure::rest::{OpiumHttpClient, OpiumRestAdapter, RetryConfig};
use opium_connector::infrastructure::websocket::{OpiumMarketStream, OpiumUserStream};
use opium_connector::{ChannelEventPublisher, ExchangePort, OpiumExchange};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::load().context("failed to load settings")?;
    tracing::info!(
        pairs = settings.trading_pairs.len(),
        trading_required = settings.trading_required,
        "starting opium connector"
    );

    let client = OpiumHttpClient::new(settings.endpoints.rest_url.clone(), RetryConfig::default())
        .context("failed to build HTTP client")?;
    let signer = AccessTokenSigner::new(settings.credentials.clone());
    let rest: Arc<dyn ExchangePort> = Arc::new(OpiumRestAdapter::new(client, signer.clone()));

    let market_stream = Arc::new(OpiumMarketStream::new(
        settings.endpoints.ws_url.clone(),
        settings.trading_pairs.clone(),
        Arc::clone(&rest),
        settings.book_update_mode,
        settings.intervals.clone(),
    ));
    let user_stream = Arc::new(OpiumUserStream::new(
        settings.endpoints.ws_url.clone(),
        settings.trading_pairs.clone(),
        signer,
        settings.intervals.clone(),
    ));
    let tracker = Arc::new(OrderBookTracker::new(
        &settings.trading_pairs,
        market_stream,
        settings.book_update_mode,
    ));

    let (events, mut event_rx) = ChannelEventPublisher::new();
    let cadence = PollCadence {
        short_interval: Duration::from_secs(settings.intervals.short_poll_secs),
        long_interval: Duration::from_secs(settings.intervals.long_poll_secs),
        silence_threshold: Duration::from_secs(settings.intervals.stream_silence_secs),
    };
    let connector = Arc::new(OpiumExchange::new(
        rest,
        tracker,
        user_stream,
        Arc::new(events),
        settings.trading_pairs.clone(),
        settings.trading_required,
        cadence,
        settings.intervals.trading_rules(),
    ));

    let cancel = CancellationToken::new();
    connector.start(&cancel);

    // Surface lifecycle events in the log until a strategy consumes them.
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            tracing::info!(event = ?event, "lifecycle event");
        }
    });

    let mut clock = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = clock.tick() => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                connector.tick(now);
            }
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for shutdown signal")?;
                break;
            }
        }
    }

    tracing::info!("shutting down, cancelling outstanding orders");
    let results = connector.cancel_all(Duration::from_secs(10)).await;
    for result in &results {
        if !result.success {
            tracing::warn!(
                order_id = %result.order_id,
                error = result.error.as_deref().unwrap_or("unknown"),
                "order not cancelled on shutdown"
            );
        }
    }
    cancel.cancel();
    Ok(())
}
