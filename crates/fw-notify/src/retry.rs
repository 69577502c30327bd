//! Bounded retry policy for notification delivery.

use std::time::Duration;

use fw_core::config::TelegramConfig;
use fw_core::time_util::exponential_backoff;

/// How many times to try a delivery and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero behaves like one.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Ceiling for the doubling delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_delay: Duration::from_millis(500), max_delay: Duration::from_secs(5) }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &TelegramConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            initial_delay: Duration::from_millis(cfg.retry_initial_delay_ms),
            max_delay: Duration::from_millis(cfg.retry_max_delay_ms),
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        exponential_backoff(self.initial_delay, self.max_delay, attempt)
    }

    /// Whether another attempt is allowed after `attempt` attempts.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_after(1), Duration::from_millis(500));
        assert_eq!(p.delay_after(2), Duration::from_secs(1));
        assert_eq!(p.delay_after(5), Duration::from_secs(5));
        assert!(p.allows_retry(1));
        assert!(p.allows_retry(2));
        assert!(!p.allows_retry(3));
    }

    #[test]
    fn zero_attempts_means_single_try() {
        let p = RetryPolicy { max_attempts: 0, ..Default::default() };
        assert!(!p.allows_retry(1));
    }
}
