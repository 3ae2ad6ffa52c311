//! Retry wrapper: exponential backoff on transient provider failures.
//!
//! The wrapper is opt-in: a loop driven by a bare provider surfaces the
//! first failure unchanged.

use async_trait::async_trait;
use deputy_config::RetryConfig;
use deputy_core::error::ProviderError;
use deputy_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Wraps any provider with retry + exponential backoff.
///
/// Retries only when [`ProviderError::is_retryable`] says so. A rate limit
/// waits for the server's `retry-after` hint when it is longer than the
/// computed backoff; a hint beyond `max_delay_ms` is not waited out and the
/// rate-limit error is returned.
pub struct RetryingProvider {
    inner: Arc<dyn Provider>,
    config: RetryConfig,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn Provider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Wait before a zero-based retry attempt: `base * 2^attempt` capped at
    /// `max_delay_ms`, or the rate-limit hint if longer. `None` when the
    /// hint exceeds `max_delay_ms`.
    fn compute_delay(&self, attempt: u32, error: &ProviderError) -> Option<Duration> {
        let base = Duration::from_millis(self.config.base_delay_ms);
        let max = Duration::from_millis(self.config.max_delay_ms);
        let backoff = base
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
            .min(max);
        match error {
            ProviderError::RateLimited { retry_after_secs } => {
                let hint = Duration::from_secs(*retry_after_secs);
                (hint <= max).then(|| backoff.max(hint))
            }
            _ => Some(backoff),
        }
    }
}

#[async_trait]
impl Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let Some(delay) = self.compute_delay(attempt, &e) else {
                        warn!(
                            provider = %self.inner.name(),
                            error = %e,
                            max_delay_ms = self.config.max_delay_ms,
                            "Rate-limit wait exceeds the retry ceiling, giving up"
                        );
                        return Err(e);
                    };
                    attempt += 1;
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying completion after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deputy_core::message::Turn;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the queued errors, then succeeds.
    struct FlakyProvider {
        failures: Mutex<Vec<ProviderError>>,
        calls: AtomicU32,
    }

    impl FlakyProvider {
        fn new(failures: Vec<ProviderError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut failures = self.failures.lock().unwrap();
                if failures.is_empty() {
                    None
                } else {
                    Some(failures.remove(0))
                }
            };
            match next {
                Some(e) => Err(e),
                None => Ok(ProviderResponse {
                    turn: Turn::assistant("ok"),
                    usage: None,
                    model: request.model,
                    stop_reason: None,
                }),
            }
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "test-model".into(),
            system: None,
            turns: vec![Turn::user("hi")],
            temperature: 0.2,
            max_tokens: None,
            tools: vec![],
        }
    }

    fn config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_from_transient_failures() {
        let inner = Arc::new(FlakyProvider::new(vec![
            ProviderError::Network("reset".into()),
            ProviderError::ApiError {
                status_code: 503,
                message: "overloaded".into(),
            },
        ]));
        let provider = RetryingProvider::new(inner.clone(), config(3));
        let response = provider.complete(request()).await.unwrap();
        assert_eq!(response.turn.text(), "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let inner = Arc::new(FlakyProvider::new(vec![
            ProviderError::Timeout("slow".into());
            5
        ]));
        let provider = RetryingProvider::new(inner.clone(), config(2));
        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let inner = Arc::new(FlakyProvider::new(vec![
            ProviderError::AuthenticationFailed("bad key".into()),
        ]));
        let provider = RetryingProvider::new(inner.clone(), config(3));
        assert!(provider.complete(request()).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let provider = RetryingProvider::new(Arc::new(FlakyProvider::new(vec![])), config(5));
        let net = ProviderError::Network("x".into());
        assert_eq!(provider.compute_delay(0, &net), Some(Duration::from_millis(100)));
        assert_eq!(provider.compute_delay(1, &net), Some(Duration::from_millis(200)));
        assert_eq!(provider.compute_delay(10, &net), Some(Duration::from_millis(1_000)));
    }

    #[test]
    fn rate_limit_hint_is_never_shortened() {
        let mut cfg = config(5);
        cfg.max_delay_ms = 10_000;
        let provider = RetryingProvider::new(Arc::new(FlakyProvider::new(vec![])), cfg);
        let limited = ProviderError::RateLimited {
            retry_after_secs: 3,
        };
        assert_eq!(provider.compute_delay(0, &limited), Some(Duration::from_secs(3)));
        let long = ProviderError::RateLimited {
            retry_after_secs: 60,
        };
        assert_eq!(provider.compute_delay(0, &long), None);
    }

    #[tokio::test(start_paused = true)]
    async fn long_rate_limit_is_returned_without_retrying() {
        let inner = Arc::new(FlakyProvider::new(vec![ProviderError::RateLimited {
            retry_after_secs: 60,
        }]));
        let provider = RetryingProvider::new(inner.clone(), config(3));
        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::RateLimited {
                retry_after_secs: 60
            }
        ));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
