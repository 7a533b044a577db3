//! Reconnect backoff policy

use rand::Rng;
use std::time::Duration;

/// Bound on the doubling exponent so the multiplier cannot overflow
const MAX_EXPONENT: u32 = 20;

/// Exponential backoff with optional jitter.
///
/// The delay doubles per consecutive failed attempt up to a fixed
/// ceiling. Attempts are unbounded; the counter resets when a connection
/// is acknowledged, so the next outage starts from the base delay again.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base: Duration,
    max: Duration,
    jitter: f64,
    attempt: u32,
}

impl ReconnectBackoff {
    /// Create a policy. `jitter` is a fraction of the delay (0.0 to 1.0)
    /// by which each delay is randomly spread.
    #[must_use]
    pub fn new(base: Duration, max: Duration, jitter: f64) -> Self {
        Self {
            base,
            max,
            jitter: jitter.clamp(0.0, 1.0),
            attempt: 0,
        }
    }

    /// Delay to wait before the next attempt, advancing the counter
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempt.min(MAX_EXPONENT);
        let capped = self
            .base
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max);
        self.attempt = self.attempt.saturating_add(1);

        if self.jitter > 0.0 {
            let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
            let jittered = capped.as_secs_f64() * (1.0 + spread);
            Duration::from_secs_f64(jittered.max(0.0)).min(self.max)
        } else {
            capped
        }
    }

    /// Attempts issued since the last reset
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Reset the counter after a successful connect
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
