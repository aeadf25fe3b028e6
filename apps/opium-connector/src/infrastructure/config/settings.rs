//! Connector configuration.
//!
//! Loaded from an optional `opium.toml` file with `OPIUM__`-prefixed
//! environment overrides (e.g. `OPIUM__CREDENTIALS__SECRET_KEY`).

use serde::Deserialize;
use std::time::Duration;

use crate::domain::order_book::BookUpdateMode;
use crate::domain::shared::TradingPair;

/// Account credentials for the venue.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    /// Account public key; identifies the account on the push channel.
    pub public_key: String,
    /// Secret used to sign access tokens.
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("public_key", &self.public_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Endpoint set for one venue deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoints {
    /// REST base URL.
    pub rest_url: String,
    /// WebSocket URL for market data and account channels.
    pub ws_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            rest_url: "https://api-test.opium.exchange/v1".to_string(),
            ws_url: "wss://api-test.opium.exchange/v1/socket".to_string(),
        }
    }
}

/// Polling and backoff intervals.
#[derive(Debug, Clone, Deserialize)]
pub struct Intervals {
    /// Trading-rule refresh period, seconds.
    pub trading_rules_secs: u64,
    /// Reconciliation poll while the push channel is stale, seconds.
    pub short_poll_secs: u64,
    /// Reconciliation poll while the push channel is live, seconds.
    pub long_poll_secs: u64,
    /// Push-channel silence that counts as stale, seconds.
    pub stream_silence_secs: u64,
    /// Backoff after user/trade stream failures, seconds.
    pub stream_retry_secs: u64,
    /// Backoff after market-data websocket failures, seconds.
    pub ws_retry_secs: u64,
    /// Spacing between per-pair snapshot fetches, seconds.
    pub snapshot_spacing_secs: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            trading_rules_secs: 60,
            short_poll_secs: 5,
            long_poll_secs: 120,
            stream_silence_secs: 60,
            stream_retry_secs: 5,
            ws_retry_secs: 30,
            snapshot_spacing_secs: 5,
        }
    }
}

impl Intervals {
    /// Trading-rule refresh period.
    #[must_use]
    pub const fn trading_rules(&self) -> Duration {
        Duration::from_secs(self.trading_rules_secs)
    }

    /// Stream retry backoff.
    #[must_use]
    pub const fn stream_retry(&self) -> Duration {
        Duration::from_secs(self.stream_retry_secs)
    }

    /// Market-data websocket retry backoff.
    #[must_use]
    pub const fn ws_retry(&self) -> Duration {
        Duration::from_secs(self.ws_retry_secs)
    }

    /// Per-pair snapshot spacing.
    #[must_use]
    pub const fn snapshot_spacing(&self) -> Duration {
        Duration::from_secs(self.snapshot_spacing_secs)
    }
}

/// Full connector settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Account credentials.
    pub credentials: Credentials,
    /// Instruments to trade and track.
    pub trading_pairs: Vec<TradingPair>,
    /// Whether actual trading is required (false = market data only).
    #[serde(default = "default_trading_required")]
    pub trading_required: bool,
    /// What the venue's book push channel delivers.
    #[serde(default = "default_book_update_mode")]
    pub book_update_mode: BookUpdateMode,
    /// Venue endpoints.
    #[serde(default)]
    pub endpoints: Endpoints,
    /// Poll/backoff intervals.
    #[serde(default)]
    pub intervals: Intervals,
}

const fn default_trading_required() -> bool {
    true
}

const fn default_book_update_mode() -> BookUpdateMode {
    // The venue's push channel delivers complete books labelled as updates.
    BookUpdateMode::FullBook
}

impl Settings {
    /// Load settings from `opium.toml` (optional) and `OPIUM__*` env vars.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("opium").required(false))
            .add_source(
                config::Environment::with_prefix("OPIUM")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("trading_pairs")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let intervals = Intervals::default();
        assert_eq!(intervals.trading_rules(), Duration::from_secs(60));
        assert_eq!(intervals.short_poll_secs, 5);
        assert_eq!(intervals.long_poll_secs, 120);
        assert_eq!(intervals.ws_retry(), Duration::from_secs(30));
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let credentials = Credentials {
            public_key: "0xabc".to_string(),
            secret_key: "super-secret".to_string(),
        };
        let debug = format!("{credentials:?}");
        assert!(debug.contains("0xabc"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn settings_deserialize_from_toml() {
        let raw = r#"
            trading_pairs = ["OEX_FUT_1JAN_135.00-DAI"]

            [credentials]
            public_key = "0xabc"
            secret_key = "s3cr3t"
        "#;
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.trading_pairs.len(), 1);
        assert!(settings.trading_required);
        assert_eq!(settings.book_update_mode, BookUpdateMode::FullBook);
        assert!(settings.endpoints.rest_url.starts_with("https://"));
    }
}
