//! Exponential backoff for platform sends. Only transient failures
//! (rate limits, connection errors) are retried.

use std::future::Future;
use std::time::Duration;

use attribution_core::config::RetryConfig;
use attribution_core::error::{AttributionError, AttributionResult};
use tokio_retry::RetryIf;

/// Delays between attempts: `initial, 2*initial, 4*initial, ...` capped at
/// `max_delay_ms`, `max_attempts - 1` of them.
pub fn backoff(config: &RetryConfig) -> impl Iterator<Item = Duration> {
    let initial = config.initial_delay_ms.max(1);
    let max_delay = config.max_delay_ms;
    (0..config.max_attempts.saturating_sub(1)).map(move |attempt| {
        let factor = u32::try_from(attempt)
            .ok()
            .and_then(|shift| 1u64.checked_shl(shift))
            .unwrap_or(u64::MAX);
        Duration::from_millis(initial.saturating_mul(factor).min(max_delay))
    })
}

pub async fn with_retry<T, F, Fut>(config: &RetryConfig, action: F) -> AttributionResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AttributionResult<T>>,
{
    RetryIf::spawn(backoff(config), action, AttributionError::is_retryable).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(max_attempts: usize) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 2,
            max_delay_ms: 10,
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let config = RetryConfig::default();
        let delays: Vec<u128> = backoff(&config).map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![2_000, 4_000]);

        let config = RetryConfig {
            max_attempts: 5,
            ..RetryConfig::default()
        };
        let delays: Vec<u128> = backoff(&config).map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![2_000, 4_000, 8_000, 10_000]);
    }

    #[test]
    fn test_backoff_keeps_odd_initial_delay() {
        let config = RetryConfig {
            max_attempts: 4,
            initial_delay_ms: 3,
            max_delay_ms: 10,
        };
        let delays: Vec<u128> = backoff(&config).map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![3, 6, 10]);

        let config = RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 1_000,
        };
        let delays: Vec<u128> = backoff(&config).map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_transient_errors_retried() {
        let calls = AtomicUsize::new(0);
        let result = with_retry(&fast(3), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(AttributionError::Connection {
                    service: "test".to_string(),
                    message: "reset".to_string(),
                })
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: AttributionResult<()> = with_retry(&fast(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AttributionError::Configuration("no credentials".to_string()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: AttributionResult<()> = with_retry(&fast(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AttributionError::RateLimit {
                service: "test".to_string(),
                retry_after_secs: None,
            })
        })
        .await;
        assert!(matches!(result, Err(AttributionError::RateLimit { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
