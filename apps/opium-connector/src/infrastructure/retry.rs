//! Retry-forever wrapper for network loops.
//!
//! Polling and streaming loops must never exit on transport errors: they
//! log, back off, and resume. Cancellation is the one exception and always
//! wins, including during the backoff sleep.

use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::websocket::ReconnectPolicy;

/// Run `operation` until `cancel` fires, backing off per `policy` after
/// every error or normal return.
///
/// A normal return is treated the same as an error: streams are infinite
/// by contract, so a clean end-of-stream still means reconnect. A clean
/// return resets the policy first, keeping long-lived connections from
/// inheriting a grown backoff.
pub async fn retry_forever<F, Fut, E>(
    name: &str,
    mut policy: ReconnectPolicy,
    cancel: CancellationToken,
    mut operation: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    loop {
        if cancel.is_cancelled() {
            tracing::debug!(task = name, "cancelled");
            return;
        }

        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(task = name, "cancelled");
                return;
            }
            result = operation() => match result {
                Ok(()) => {
                    policy.reset();
                    tracing::warn!(task = name, "task ended unexpectedly; restarting");
                }
                Err(error) => {
                    tracing::warn!(task = name, error = %error, "task failed; restarting");
                }
            }
        }

        let delay = policy.next_delay();
        tracing::debug!(task = name, delay_ms = delay.as_millis(), "backing off");
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(task = name, "cancelled during backoff");
                return;
            }
            () = tokio::time::sleep(delay) => {}
        }
    }
}
