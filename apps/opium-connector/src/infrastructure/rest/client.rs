//! HTTP client wrapper with retry logic for the Opium REST API.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::OpiumApiError;

/// Retry behavior for transient failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts per request.
    pub max_attempts: u32,
    /// First backoff delay.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Doubling backoff tracker for one request.
struct ExponentialBackoff {
    next_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl ExponentialBackoff {
    fn new(config: &RetryConfig) -> Self {
        Self {
            next_delay: config.initial_backoff,
            max_delay: config.max_backoff,
            max_attempts: config.max_attempts,
            attempt: 0,
        }
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }
        let delay = self.next_delay;
        self.next_delay = (self.next_delay * 2).min(self.max_delay);
        Some(delay)
    }
}

enum ErrorCategory {
    RateLimited,
    Retryable,
    NotFound,
    Fatal,
}

fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        404 => ErrorCategory::NotFound,
        500..=599 => ErrorCategory::Retryable,
        _ => ErrorCategory::Fatal,
    }
}

/// HTTP client for the Opium REST API.
///
/// One instance owns one shared `reqwest::Client`; all connector REST
/// traffic multiplexes over it.
#[derive(Debug, Clone)]
pub struct OpiumHttpClient {
    client: Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl OpiumHttpClient {
    /// Create a client for the given base URL.
    pub fn new(base_url: impl Into<String>, retry_config: RetryConfig) -> Result<Self, OpiumApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| OpiumApiError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            retry_config,
        })
    }

    /// Make a GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, OpiumApiError> {
        self.request("GET", path, None::<&()>).await
    }

    /// Make a POST request with a JSON body.
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, OpiumApiError> {
        self.request("POST", path, Some(body)).await
    }

    /// Make a DELETE request.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, OpiumApiError> {
        self.request("DELETE", path, None::<&()>).await
    }

    async fn request<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: &str,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, OpiumApiError> {
        let url = format!("{}{path}", self.base_url);
        let mut backoff = ExponentialBackoff::new(&self.retry_config);

        loop {
            let request = match method {
                "POST" => {
                    let mut req = self.client.post(&url);
                    if let Some(b) = body {
                        req = req.json(b);
                    }
                    req
                }
                "DELETE" => self.client.delete(&url),
                _ => self.client.get(&url),
            };

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            error = %e,
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempt,
                            "network error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(OpiumApiError::MaxRetriesExceeded {
                        attempts: backoff.attempt,
                    });
                }
            };

            let status = response.status();

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| OpiumApiError::Network(e.to_string()))?;
                if text.is_empty() {
                    return serde_json::from_str("null")
                        .map_err(|e| OpiumApiError::JsonParse(e.to_string()));
                }
                return serde_json::from_str(&text)
                    .map_err(|e| OpiumApiError::JsonParse(e.to_string()));
            }

            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let error_body = response.text().await.unwrap_or_default();

            match categorize_status(status) {
                ErrorCategory::RateLimited => {
                    let delay = retry_after
                        .map(Duration::from_secs)
                        .or_else(|| backoff.next_backoff());
                    if let Some(delay) = delay {
                        tracing::warn!(
                            delay_ms = delay.as_millis(),
                            "rate limited, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(OpiumApiError::RateLimited {
                        retry_after_secs: retry_after.unwrap_or(60),
                    });
                }
                ErrorCategory::Retryable => {
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            status = status.as_u16(),
                            body = %error_body,
                            delay_ms = delay.as_millis(),
                            "retryable error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(OpiumApiError::MaxRetriesExceeded {
                        attempts: backoff.attempt,
                    });
                }
                ErrorCategory::NotFound => {
                    return Err(OpiumApiError::NotFound {
                        message: error_body,
                    });
                }
                ErrorCategory::Fatal => {
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(OpiumApiError::AuthenticationFailed);
                    }
                    return Err(OpiumApiError::Http {
                        status: status.as_u16(),
                        message: error_body,
                    });
                }
            }
        }
    }
}
