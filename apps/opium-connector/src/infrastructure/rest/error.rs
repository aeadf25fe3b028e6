//! REST client error type and mapping onto the port taxonomy.

use crate::application::ports::ExchangeError;

/// Errors surfaced by the Opium REST client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OpiumApiError {
    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Response body failed to decode.
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// The venue returned a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Venue-supplied error message.
        message: String,
    },

    /// The venue throttled the request and retries were exhausted.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The referenced resource does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Venue-supplied detail.
        message: String,
    },

    /// Credentials are missing or were rejected.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Transient errors persisted past the retry budget.
    #[error("max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Attempts made before giving up.
        attempts: u32,
    },
}

impl From<OpiumApiError> for ExchangeError {
    fn from(error: OpiumApiError) -> Self {
        match error {
            OpiumApiError::Network(message) => Self::Network { message },
            OpiumApiError::JsonParse(message) => Self::Unknown {
                message: format!("decode failure: {message}"),
            },
            OpiumApiError::Http { status, message } if status == 400 || status == 422 => {
                Self::Rejected { reason: message }
            }
            OpiumApiError::Http { status, message } => Self::Unknown {
                message: format!("HTTP {status}: {message}"),
            },
            OpiumApiError::RateLimited { retry_after_secs } => Self::RateLimited {
                retry_after_secs: Some(retry_after_secs),
            },
            OpiumApiError::NotFound { message } => Self::OrderNotFound { order_id: message },
            OpiumApiError::AuthenticationFailed => Self::Rejected {
                reason: "authentication failed".to_string(),
            },
            OpiumApiError::MaxRetriesExceeded { attempts } => Self::Network {
                message: format!("max retries exceeded after {attempts} attempts"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_rejection() {
        let error = ExchangeError::from(OpiumApiError::Http {
            status: 400,
            message: "price below tick".to_string(),
        });
        assert!(matches!(error, ExchangeError::Rejected { .. }));
    }

    #[test]
    fn network_errors_stay_transient() {
        let error = ExchangeError::from(OpiumApiError::Network("timeout".to_string()));
        assert!(error.is_transient());

        let error = ExchangeError::from(OpiumApiError::MaxRetriesExceeded { attempts: 4 });
        assert!(error.is_transient());
    }

    #[test]
    fn not_found_maps_to_order_not_found() {
        let error = ExchangeError::from(OpiumApiError::NotFound {
            message: "783452".to_string(),
        });
        assert!(matches!(error, ExchangeError::OrderNotFound { .. }));
    }
}
