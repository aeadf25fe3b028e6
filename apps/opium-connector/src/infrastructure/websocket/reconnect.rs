//! Reconnection backoff policy.
//!
//! Exponential backoff with jitter for streaming connections. Fixed-delay
//! policies (multiplier 1.0) cover channels where the venue prescribes a
//! flat retry interval.

use rand::Rng;
use std::time::Duration;

/// Backoff policy for reconnect loops.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_factor: f64,
    current_delay: Duration,
}

impl ReconnectPolicy {
    /// Create an exponential policy.
    #[must_use]
    pub const fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier,
            jitter_factor: 0.1,
            current_delay: initial_delay,
        }
    }

    /// Create a flat policy that always waits `delay` (plus jitter).
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay, 1.0)
    }

    /// Next delay to wait before reconnecting.
    ///
    /// Advances the internal schedule; never gives up.
    #[must_use]
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.apply_jitter(self.current_delay);

        let scaled = self.current_delay.as_millis() as f64 * self.multiplier;
        let capped = scaled.min(self.max_delay.as_millis() as f64).max(1.0);
        self.current_delay = Duration::from_millis(capped as u64);

        delay
    }

    /// Reset the schedule after a successful connection.
    pub const fn reset(&mut self) {
        self.current_delay = self.initial_delay;
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return duration;
        }
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        Duration::from_millis((base_millis + jitter).max(1.0) as u64)
    }

    #[cfg(test)]
    const fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_until_cap() {
        let mut policy =
            ReconnectPolicy::new(Duration::from_millis(100), Duration::from_millis(350), 2.0)
                .without_jitter();

        assert_eq!(policy.next_delay(), Duration::from_millis(100));
        assert_eq!(policy.next_delay(), Duration::from_millis(200));
        assert_eq!(policy.next_delay(), Duration::from_millis(350));
        assert_eq!(policy.next_delay(), Duration::from_millis(350));
    }

    #[test]
    fn fixed_policy_never_grows() {
        let mut policy = ReconnectPolicy::fixed(Duration::from_secs(5)).without_jitter();
        for _ in 0..10 {
            assert_eq!(policy.next_delay(), Duration::from_secs(5));
        }
    }

    #[test]
    fn reset_restores_initial_delay() {
        let mut policy =
            ReconnectPolicy::new(Duration::from_millis(100), Duration::from_secs(60), 2.0)
                .without_jitter();
        let _ = policy.next_delay();
        let _ = policy.next_delay();
        policy.reset();
        assert_eq!(policy.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::fixed(Duration::from_millis(1000));
            let delay = policy.next_delay().as_millis();
            assert!((900..=1100).contains(&delay), "delay {delay}ms out of bounds");
        }
    }
}
