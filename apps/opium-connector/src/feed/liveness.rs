//! Push-channel liveness heuristic and poll scheduling.
//!
//! REST reconciliation is redundant work while the account stream is
//! healthy, so the poll cadence adapts: a quiet stream accelerates polling
//! to a short interval, a live stream relaxes it to a long one.

use std::time::Duration;

/// Poll cadence thresholds.
#[derive(Debug, Clone)]
pub struct PollCadence {
    /// Interval used while the push channel looks stale.
    pub short_interval: Duration,
    /// Interval used while the push channel is delivering.
    pub long_interval: Duration,
    /// Push-channel silence beyond this switches to the short interval.
    pub silence_threshold: Duration,
}

impl Default for PollCadence {
    fn default() -> Self {
        Self {
            short_interval: Duration::from_secs(5),
            long_interval: Duration::from_secs(120),
            silence_threshold: Duration::from_secs(60),
        }
    }
}

impl PollCadence {
    /// Pick the reconciliation interval for the observed stream silence.
    ///
    /// `None` means the stream has never delivered a message, which counts
    /// as stale.
    #[must_use]
    pub const fn poll_interval(&self, silence: Option<Duration>) -> Duration {
        match silence {
            Some(elapsed) if elapsed.as_secs() <= self.silence_threshold.as_secs() => {
                self.long_interval
            }
            _ => self.short_interval,
        }
    }

    /// Whether a wall-clock interval boundary was crossed between two
    /// timestamps (seconds since epoch).
    #[must_use]
    pub const fn crossed_boundary(interval: Duration, last_secs: u64, now_secs: u64) -> bool {
        let interval_secs = interval.as_secs();
        if interval_secs == 0 {
            return true;
        }
        now_secs / interval_secs > last_secs / interval_secs
    }
}
