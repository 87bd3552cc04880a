//! Exponential backoff with jitter (§4.4), driven by `PipelineError::classify`.
//! Permanent errors fail fast; transient and rate-limited errors retry up to
//! `max_attempts` with delay doubling from `base_delay_ms` capped at
//! `max_delay_ms`.

use std::future::Future;
use std::time::Duration;

use dsi_common::config::RetryDefaults;
use dsi_common::{Classification, PipelineError};
use rand::Rng;
use tracing::warn;

pub async fn retry<F, Fut, T>(defaults: &RetryDefaults, operation_name: &str, mut op: F) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let classification = err.classify();
                if classification == Classification::Permanent || attempt >= defaults.max_attempts {
                    return Err(err);
                }
                let delay = backoff_delay(defaults, attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn backoff_delay(defaults: &RetryDefaults, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let raw = defaults
        .base_delay_ms
        .saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX));
    let capped = raw.min(defaults.max_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=capped / 4 + 1);
    Duration::from_millis(capped.saturating_add(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn defaults() -> RetryDefaults {
        RetryDefaults {
            max_attempts: 4,
            base_delay_ms: 10,
            max_delay_ms: 100,
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_works() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, PipelineError> = retry(&defaults(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_immediately_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, PipelineError> = retry(&defaults(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::DataInvariant("bad".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_error_up_to_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, PipelineError> = retry(&defaults(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::TransientExternal {
                service: "search".into(),
                source: anyhow::anyhow!("timeout"),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn backoff_delay_never_exceeds_cap_plus_jitter_headroom() {
        let defaults = defaults();
        for attempt in 1..8 {
            let delay = backoff_delay(&defaults, attempt);
            assert!(delay.as_millis() as u64 <= defaults.max_delay_ms + defaults.max_delay_ms / 4 + 1);
        }
    }
}
