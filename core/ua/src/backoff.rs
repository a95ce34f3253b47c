//! Bounded exponential backoff for registration retries.
//!
//! `sip_ua::registration::Registration` only re-registers on its own expiry timer; it
//! has no notion of backing off after a failed attempt. This fills that gap: each
//! failure widens the retry window, capped so a long-dead registrar doesn't push
//! retries out indefinitely.

use std::time::Duration;

use rand::Rng;

pub struct Backoff {
    regint: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(regint: Duration) -> Self {
        Self { regint, attempt: 0 }
    }

    /// Resets the attempt counter after a successful registration.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Picks the next retry delay, in `[0.5 * regint, 2 * regint * min(64, 2^attempt)]`,
    /// and advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let lower = self.regint.mul_f64(0.5);
        let multiplier = (1u64 << self.attempt.min(6)).min(64) as f64;
        let upper = self.regint.mul_f64(2.0 * multiplier);

        self.attempt = self.attempt.saturating_add(1);

        if upper <= lower {
            return lower;
        }

        let lower_ms = lower.as_millis() as u64;
        let upper_ms = upper.as_millis() as u64;
        let delay_ms = rand::rng().random_range(lower_ms..=upper_ms);
        Duration::from_millis(delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_within_bounds_and_widens_with_attempts() {
        let mut backoff = Backoff::new(Duration::from_secs(60));

        let first = backoff.next_delay();
        assert!(first >= Duration::from_secs(30));
        assert!(first <= Duration::from_secs(120));

        for _ in 0..10 {
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_secs(30));
            assert!(delay <= Duration::from_secs(60 * 2 * 64));
        }
    }

    #[test]
    fn reset_returns_to_first_window() {
        let mut backoff = Backoff::new(Duration::from_secs(60));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        let delay = backoff.next_delay();
        assert!(delay <= Duration::from_secs(120));
    }
}
