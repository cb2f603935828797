//! Bounded exponential backoff with jitter (spec §4.5).
//!
//! New code: nothing upstream does retry directly, so this follows the
//! same "small free function + config struct" shape as `idempotency.rs`
//! rather than reaching for a crate — the logic is a dozen lines, and
//! `grafbase-nexus`/`ProdByBuddha-rust_agency` pull in `governor` for
//! *rate limiting*, a different problem, so it is not reused here. Jitter
//! uses `rand`, already pulled in for id generation elsewhere.

use crate::config::RetryConfig;
use crate::error::ErrorKind;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Compute the delay before attempt number `attempt` (0-indexed: the delay
/// before the *first* retry, i.e. after the initial attempt has failed).
/// Full jitter per spec §4.5: `random(0, base * factor^attempt)`.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = config.factor.powi(attempt as i32);
    let ceiling = config.base_delay.mul_f64(exp);
    let jittered_millis = rand::thread_rng().gen_range(0..=ceiling.as_millis().max(1) as u64);
    Duration::from_millis(jittered_millis)
}

/// Run `f` up to `config.max_attempts` times, retrying only on
/// [`ErrorKind::is_transient`] failures. A fatal or exhausted-budget error
/// is returned immediately without consuming further attempts.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut f: F) -> Result<T, ErrorKind>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ErrorKind>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < config.max_attempts => {
                tokio::time::sleep(backoff_delay(config, attempt)).await;
                attempt += 1;
            }
            Err(ErrorKind::Transient(msg)) => {
                return Err(ErrorKind::Exhausted(format!(
                    "retry budget of {} attempts exhausted: {msg}",
                    config.max_attempts
                )))
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn config() -> RetryConfig {
        RetryConfig {
            base_delay: Duration::from_millis(1),
            factor: 2.0,
            max_attempts: 3,
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = with_retry(&config(), || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ErrorKind>(42)
            }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = with_retry(&config(), || {
            let calls = calls2.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ErrorKind::Transient("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_budget_and_reports_exhausted() {
        let result: Result<(), ErrorKind> = with_retry(&config(), || async {
            Err(ErrorKind::Transient("always fails".into()))
        })
        .await;
        assert!(matches!(result, Err(ErrorKind::Exhausted(_))));
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: Result<(), ErrorKind> = with_retry(&config(), || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ErrorKind::Fatal("bug".into()))
            }
        })
        .await;
        assert!(matches!(result, Err(ErrorKind::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_delay_grows_with_attempt() {
        let cfg = RetryConfig {
            base_delay: Duration::from_millis(100),
            factor: 2.0,
            max_attempts: 5,
        };
        let ceiling_0 = cfg.base_delay.mul_f64(cfg.factor.powi(0));
        let ceiling_3 = cfg.base_delay.mul_f64(cfg.factor.powi(3));
        assert!(ceiling_3 > ceiling_0);
        let d = backoff_delay(&cfg, 3);
        assert!(d <= ceiling_3);
    }
}
