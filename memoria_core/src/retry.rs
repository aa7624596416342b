//! Jittered exponential backoff (§7.1), generalizing the donor's fixed
//! `base_delays` schedule into `min(max_delay, base_delay * 2^n) * U(0.5, 1.5)`.
//!
//! Used to wrap every collaborator-port call classified as retryable (LLM,
//! embedder, reranker, and store calls returning a transient `PortError`).

use std::fmt::Display;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl BackoffConfig {
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let capped = exp.min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        capped.mul_f64(jitter)
    }
}

/// Retry `operation` under `config`, returning the last error once
/// `max_attempts` is exhausted. Only the caller decides retryability (e.g.
/// via `PortError::is_retryable`/`MemoryError::is_retryable`) — this
/// function retries unconditionally up to the attempt budget.
pub async fn retry_with_backoff<F, Fut, T, E>(config: BackoffConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt + 1 < config.max_attempts {
                    let delay = config.delay_for_attempt(attempt as u32);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "operation failed, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    #[allow(clippy::unwrap_used)]
    Err(last_error.unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_first_try() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = attempts.clone();
        let result: Result<(), String> = retry_with_backoff(BackoffConfig::default(), || {
            let a = a.clone();
            async move {
                a.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_budget_exhausted() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = attempts.clone();
        let config = BackoffConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let result: Result<(), String> = retry_with_backoff(config, || {
            let a = a.clone();
            async move {
                a.fetch_add(1, Ordering::SeqCst);
                Err("fail".to_string())
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
