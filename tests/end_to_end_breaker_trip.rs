//! Scenario 3 from spec §8, against `kernel::breaker` directly: no store
//! involved, so this one needs no Postgres and runs unconditionally.
//!
//! Thresholds are scaled down from the scenario's `recovery_timeout=60s`
//! to keep the test fast; the state machine is timeout-relative, not
//! wall-clock-absolute, so the scaling doesn't change what's exercised.

use kernel::breaker::{BreakerState, CircuitBreaker};
use kernel::config::BreakerConfig;
use kernel::error::ErrorKind;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn scenario_config() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 3,
        success_threshold: 1,
        recovery_timeout: Duration::from_millis(80),
        call_timeout: Duration::from_secs(1),
        half_open_max_concurrent: 1,
    }
}

#[tokio::test]
async fn five_consecutive_failures_trip_then_recover() {
    let breaker = CircuitBreaker::new("llm-api", scenario_config());
    let invocations = AtomicUsize::new(0);

    for _ in 0..3 {
        let result = breaker
            .call(|| {
                invocations.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ErrorKind::Transient("upstream 500".into())) }
            })
            .await;
        assert!(matches!(result, Err(ErrorKind::Transient(_))));
    }
    assert_eq!(breaker.state(), BreakerState::Open);
    assert_eq!(invocations.load(Ordering::SeqCst), 3);

    for _ in 0..2 {
        let result = breaker
            .call(|| {
                invocations.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ErrorKind::Transient("upstream 500".into())) }
            })
            .await;
        assert!(matches!(result, Err(ErrorKind::CircuitOpen(_))));
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 3, "open breaker must not invoke the dependency");

    tokio::time::sleep(Duration::from_millis(100)).await;

    let probe = breaker
        .call(|| {
            invocations.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ErrorKind>(()) }
        })
        .await;
    assert!(probe.is_ok());
    assert_eq!(breaker.state(), BreakerState::Closed);
    assert_eq!(invocations.load(Ordering::SeqCst), 4);
}
