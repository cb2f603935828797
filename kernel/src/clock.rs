//! Testable time source (spec §6 `Clock` collaborator).
//!
//! Schedulers, TTL checks, and backoff computation all go through a `Clock`
//! instead of calling `chrono::Utc::now()`/`tokio::time::sleep` directly, so
//! tests can drive time deterministically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Abstraction over wall-clock time and sleeping.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by the system time and tokio's timer wheel.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Deterministic clock for tests: `now()` is fixed until explicitly
/// advanced, and `sleep()` advances it immediately instead of waiting.
#[derive(Clone)]
pub struct FixedClock {
    inner: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    /// Create a fixed clock starting at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `duration` without sleeping.
    pub fn advance(&self, duration: Duration) {
        let mut guard = self.inner.lock().unwrap();
        *guard += chrono::Duration::from_std(duration).unwrap_or_default();
    }
}

#[async_trait]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.inner.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_clock_advances_on_sleep_without_waiting() {
        let clock = FixedClock::new(Utc::now());
        let before = clock.now();
        clock.sleep(Duration::from_secs(30)).await;
        let after = clock.now();
        assert_eq!((after - before).num_seconds(), 30);
    }

    #[test]
    fn fixed_clock_advance_is_additive() {
        let clock = FixedClock::new(Utc::now());
        let before = clock.now();
        clock.advance(Duration::from_secs(10));
        clock.advance(Duration::from_secs(20));
        assert_eq!((clock.now() - before).num_seconds(), 30);
    }
}
