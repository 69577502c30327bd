//! Time utilities.
//!
//! Liveness measurements go through [`MonotonicClock`], which reads
//! `tokio::time::Instant` so that paused-time tests can drive it
//! deterministically. [`exponential_backoff`] is shared by the reconnect loop
//! and the notification retry policy.

use std::time::Duration;

use tokio::time::Instant;

/// Monotonic clock measuring milliseconds since its own creation.
///
/// Values fit in an `AtomicU64`, which lets callbacks on any thread stamp a
/// reading without taking a lock.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Start a new clock at zero.
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    /// Milliseconds elapsed since the clock was created.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    /// Time elapsed between a previous reading and now. Saturates at zero.
    #[inline]
    pub fn since(&self, earlier_ms: u64) -> Duration {
        Duration::from_millis(self.now_ms().saturating_sub(earlier_ms))
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Delay before retry number `attempt` (1-based): `initial * 2^(attempt-1)`,
/// capped at `max`. Attempt 0 is treated as attempt 1.
pub fn exponential_backoff(initial: Duration, max: Duration, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    initial.checked_mul(1u32 << shift).map_or(max, |d| d.min(max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let delays: Vec<u64> = (1..=10)
            .map(|a| exponential_backoff(Duration::from_secs(1), Duration::from_secs(60), a).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60, 60, 60]);
    }

    #[test]
    fn backoff_never_overflows() {
        let d = exponential_backoff(Duration::from_secs(u64::MAX / 2), Duration::from_secs(60), 40);
        assert_eq!(d, Duration::from_secs(60));
        assert_eq!(exponential_backoff(Duration::from_millis(500), Duration::from_secs(5), 0), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn monotonic_clock_follows_tokio_time() {
        let clock = MonotonicClock::new();
        assert_eq!(clock.now_ms(), 0);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(clock.now_ms(), 5_000);
        assert_eq!(clock.since(1_000), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn since_saturates() {
        let clock = MonotonicClock::new();
        assert_eq!(clock.since(10_000), Duration::ZERO);
    }
}
