//! Per-dependency circuit breaker (spec §4.3).
//!
//! New code: no breaker exists elsewhere in this codebase's lineage, but
//! the shape follows `server/gateway/src/rate_limit.rs`'s `RateLimiter` —
//! a `Mutex`-guarded map of per-key state next to a separate
//! `Mutex`-guarded metrics counter, mutated under a short-held lock per
//! call. Counters are mirrored into the `metrics` facade (SPEC_FULL.md
//! §4.3a) the same way `RateLimiter` keeps its `RateMetricsSnapshot`
//! decoupled from whichever store backs `RateState`.

use crate::config::BreakerConfig;
use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Circuit breaker state (spec §4.3 diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Default)]
pub struct BreakerMetrics {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    half_open_successes: u32,
    half_open_in_flight: u32,
    last_state_change: DateTime<Utc>,
    metrics: BreakerMetrics,
}

/// One breaker instance per logical outbound dependency.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let name = name.into();
        Self {
            name,
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                half_open_in_flight: 0,
                last_state_change: Utc::now(),
                metrics: BreakerMetrics::default(),
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    pub fn metrics(&self) -> BreakerMetrics {
        self.inner.lock().unwrap().metrics.clone()
    }

    /// Transition out of `Open` into `HalfOpen` if `recovery_timeout` has
    /// elapsed. Called on every call attempt before admission is decided.
    fn maybe_recover(&self, inner: &mut Inner, now: DateTime<Utc>) {
        if inner.state == BreakerState::Open {
            let elapsed = now - inner.last_state_change;
            if elapsed
                >= chrono::Duration::from_std(self.config.recovery_timeout).unwrap_or_default()
            {
                inner.state = BreakerState::HalfOpen;
                inner.half_open_successes = 0;
                inner.half_open_in_flight = 0;
                inner.last_state_change = now;
            }
        }
    }

    /// Decide whether a call may proceed right now, given `now`.
    fn admit(&self, now: DateTime<Utc>) -> Result<(), ErrorKind> {
        let mut inner = self.inner.lock().unwrap();
        self.maybe_recover(&mut inner, now);

        match inner.state {
            BreakerState::Closed => {
                inner.metrics.calls += 1;
                Ok(())
            }
            BreakerState::Open => Err(ErrorKind::CircuitOpen(self.name.clone())),
            BreakerState::HalfOpen => {
                if inner.half_open_in_flight >= self.config.half_open_max_concurrent {
                    Err(ErrorKind::CircuitOpen(self.name.clone()))
                } else {
                    inner.half_open_in_flight += 1;
                    inner.metrics.calls += 1;
                    Ok(())
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.metrics.successes += 1;
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures = 0;
            }
            BreakerState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.last_state_change = Utc::now();
                }
            }
            BreakerState::Open => {}
        }
        metrics::counter!("breaker_calls_total", "dependency" => self.name.clone(), "outcome" => "success")
            .increment(1);
    }

    fn record_failure(&self, timed_out: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.metrics.failures += 1;
        if timed_out {
            inner.metrics.timeouts += 1;
        }
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.last_state_change = Utc::now();
                }
            }
            BreakerState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.state = BreakerState::Open;
                inner.last_state_change = Utc::now();
            }
            BreakerState::Open => {}
        }
        metrics::counter!("breaker_calls_total", "dependency" => self.name.clone(), "outcome" => "failure")
            .increment(1);
    }

    /// Run `f` through the breaker: rejected immediately with `CircuitOpen`
    /// while open; timed out against `call_timeout` while closed/half-open;
    /// failures and timeouts both count toward the breaker's thresholds.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, ErrorKind>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ErrorKind>>,
    {
        self.admit(Utc::now())?;

        match tokio::time::timeout(self.config.call_timeout, f()).await {
            Ok(Ok(value)) => {
                self.record_success();
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record_failure(false);
                Err(err)
            }
            Err(_) => {
                self.record_failure(true);
                Err(ErrorKind::Transient(format!(
                    "{}: call timed out after {:?}",
                    self.name, self.config.call_timeout
                )))
            }
        }
    }
}

/// Get-or-create registry of breakers keyed by dependency name (spec §4.3).
#[derive(Clone)]
pub struct BreakerRegistry {
    breakers: Arc<Mutex<HashMap<String, Arc<CircuitBreaker>>>>,
    default_config: BreakerConfig,
}

impl BreakerRegistry {
    pub fn new(default_config: BreakerConfig) -> Self {
        Self {
            breakers: Arc::new(Mutex::new(HashMap::new())),
            default_config,
        }
    }

    pub fn get_or_create(&self, name: &str, config: Option<BreakerConfig>) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap();
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    name,
                    config.unwrap_or_else(|| self.default_config.clone()),
                ))
            })
            .clone()
    }

    /// Health summary: a per-breaker state/metrics snapshot.
    pub fn health_summary(&self) -> HashMap<String, (BreakerState, BreakerMetrics)> {
        let breakers = self.breakers.lock().unwrap();
        breakers
            .iter()
            .map(|(name, breaker)| (name.clone(), (breaker.state(), breaker.metrics())))
            .collect()
    }

    /// Reset every breaker back to `Closed` with zeroed counters. Used by
    /// operator tooling and tests, never by production call paths.
    pub fn reset_all(&self) {
        let mut breakers = self.breakers.lock().unwrap();
        breakers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn fast_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            success_threshold: 1,
            recovery_timeout: StdDuration::from_millis(50),
            call_timeout: StdDuration::from_millis(200),
            half_open_max_concurrent: 3,
        }
    }

    #[tokio::test]
    async fn opens_after_failure_threshold_and_rejects_without_calling() {
        let breaker = CircuitBreaker::new("llm-api", fast_config());

        for _ in 0..3 {
            let _ = breaker
                .call(|| async { Err::<(), _>(ErrorKind::Transient("boom".into())) })
                .await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        let called = Arc::new(Mutex::new(false));
        let called_clone = called.clone();
        let result = breaker
            .call(move || {
                *called_clone.lock().unwrap() = true;
                async { Ok::<_, ErrorKind>(()) }
            })
            .await;

        assert!(matches!(result, Err(ErrorKind::CircuitOpen(_))));
        assert!(!*called.lock().unwrap(), "dependency must not be invoked while open");
    }

    #[tokio::test]
    async fn half_open_probe_closes_breaker_on_success() {
        let breaker = CircuitBreaker::new("llm-api", fast_config());
        for _ in 0..3 {
            let _ = breaker
                .call(|| async { Err::<(), _>(ErrorKind::Transient("boom".into())) })
                .await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(StdDuration::from_millis(60)).await;

        let result = breaker.call(|| async { Ok::<_, ErrorKind>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_breaker() {
        let breaker = CircuitBreaker::new("llm-api", fast_config());
        for _ in 0..3 {
            let _ = breaker
                .call(|| async { Err::<(), _>(ErrorKind::Transient("boom".into())) })
                .await;
        }
        tokio::time::sleep(StdDuration::from_millis(60)).await;

        let _ = breaker
            .call(|| async { Err::<(), _>(ErrorKind::Transient("still broken".into())) })
            .await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let mut cfg = fast_config();
        cfg.call_timeout = StdDuration::from_millis(10);
        let breaker = CircuitBreaker::new("llm-api", cfg);

        let result = breaker
            .call(|| async {
                tokio::time::sleep(StdDuration::from_millis(50)).await;
                Ok::<_, ErrorKind>(())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(breaker.metrics().timeouts, 1);
    }

    #[test]
    fn registry_get_or_create_is_idempotent() {
        let registry = BreakerRegistry::new(BreakerConfig::default());
        let a = registry.get_or_create("reddit-api", None);
        let b = registry.get_or_create("reddit-api", None);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
