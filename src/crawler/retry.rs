//! Retry with exponential backoff behind a per-URL circuit breaker
//!
//! `execute` runs one logical fetch: up to `max_retries + 1` attempts with
//! backoff between them. The circuit breaker outlives a single call, so a URL
//! that keeps failing is skipped without touching the network until its
//! cooldown has passed. Domain health stretches the backoff for struggling hosts.

use crate::config::Config;
use crate::crawler::FetchError;
use crate::state::{CircuitBreaker, CircuitPosition, DomainHealthTracker};
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why `execute` produced no result
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("Circuit open for {url}, {remaining:?} of cooldown left")]
    CircuitOpen { url: String, remaining: Duration },

    #[error("Gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: FetchError,
    },

    #[error("{0}")]
    Permanent(FetchError),
}

impl RetryError {
    /// Short reason stored on failed page records
    pub fn reason(&self) -> String {
        match self {
            Self::CircuitOpen { .. } => "circuit open".to_string(),
            Self::Exhausted { last, .. } => last.reason(),
            Self::Permanent(e) => e.reason(),
        }
    }

    /// Returns true if a later attempt in this session could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

/// Backoff settings
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.crawler.max_retries,
            base_delay: Duration::from_millis(config.retry.base_delay_ms),
            backoff_multiplier: config.retry.backoff_multiplier,
            max_delay: Duration::from_millis(config.retry.max_delay_ms),
            jitter: config.retry.jitter,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt`, before jitter
    ///
    /// `base × multiplier^attempt × (2 − health)`, capped at `max_delay`. A fully
    /// healthy domain gets the plain exponential delay; one at minimum health
    /// waits 1.9 times as long.
    pub fn backoff_delay(&self, attempt: u32, health: f64) -> Duration {
        let exponential = self.backoff_multiplier.powi(attempt.min(32) as i32);
        let health_factor = 2.0 - health.clamp(0.0, 1.0);
        let secs = self.base_delay.as_secs_f64() * exponential * health_factor;
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Applies ±50% jitter when enabled
    pub fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.5..=1.5);
        delay.mul_f64(factor)
    }
}

/// Fetch executor owning the breaker and health state for one session
#[derive(Debug)]
pub struct FetchRetryEngine {
    policy: RetryPolicy,
    breaker: CircuitBreaker,
    health: DomainHealthTracker,
}

impl FetchRetryEngine {
    pub fn new(policy: RetryPolicy, breaker: CircuitBreaker) -> Self {
        Self {
            policy,
            breaker,
            health: DomainHealthTracker::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            RetryPolicy::from_config(config),
            CircuitBreaker::new(
                config.crawler.circuit_breaker_threshold,
                Duration::from_secs(config.crawler.circuit_breaker_cooldown_seconds),
            ),
        )
    }

    /// Runs `fetch` with retries
    ///
    /// # Arguments
    ///
    /// * `url` - Circuit breaker key
    /// * `domain` - Domain health key
    /// * `fetch` - Produces one attempt each time it is called
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - An attempt succeeded; the URL's circuit is reset
    /// * `Err(RetryError::CircuitOpen)` - The circuit was open before an attempt;
    ///   nothing further was sent
    /// * `Err(RetryError::Permanent)` - A non-retryable failure, returned at once
    /// * `Err(RetryError::Exhausted)` - Every attempt failed transiently
    pub async fn execute<T, F, Fut>(
        &mut self,
        url: &str,
        domain: &str,
        mut fetch: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max_attempts = self.policy.max_retries + 1;
        let mut attempt = 0;

        loop {
            // Checked before every attempt so a half-open circuit gets exactly one
            if let CircuitPosition::Open { remaining } = self.breaker.position(url, Instant::now()) {
                tracing::debug!("Skipping {}: circuit open", url);
                return Err(RetryError::CircuitOpen {
                    url: url.to_string(),
                    remaining,
                });
            }

            attempt += 1;
            match fetch().await {
                Ok(value) => {
                    self.breaker.record_success(url);
                    self.health.record_success(domain);
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => {
                    tracing::debug!("Permanent failure for {}: {}", url, e);
                    return Err(RetryError::Permanent(e));
                }
                Err(e) => {
                    self.breaker.record_failure(url, Instant::now());
                    let health = self.health.record_failure(domain);

                    if attempt >= max_attempts {
                        tracing::debug!("Retries exhausted for {} after {} attempts", url, attempt);
                        return Err(RetryError::Exhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            last: e,
                        });
                    }

                    let delay = self
                        .policy
                        .jittered(self.policy.backoff_delay(attempt - 1, health));
                    tracing::debug!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt,
                        max_attempts,
                        url,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn health(&self) -> &DomainHealthTracker {
        &self.health
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(50),
            jitter: false,
        }
    }

    fn engine(max_retries: u32, threshold: u32) -> FetchRetryEngine {
        FetchRetryEngine::new(
            policy(max_retries),
            CircuitBreaker::new(threshold, Duration::from_secs(300)),
        )
    }

    fn server_error() -> FetchError {
        FetchError::Status {
            url: "https://example.com/x".to_string(),
            code: 500,
        }
    }

    const URL: &str = "https://example.com/x";

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let mut engine = engine(3, 5);
        let calls = Cell::new(0);
        let result = engine
            .execute(URL, "example.com", || {
                calls.set(calls.get() + 1);
                async { Ok::<_, FetchError>("body") }
            })
            .await;

        assert_eq!(result.unwrap(), "body");
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let mut engine = engine(3, 10);
        let calls = Cell::new(0);
        let result = engine
            .execute(URL, "example.com", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(server_error())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(engine.breaker().failure_count(URL), 0);
        // Two failures then one success
        assert!((engine.health().health("example.com") - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_retries_plus_one() {
        let mut engine = engine(2, 10);
        let calls = Cell::new(0);
        let result: Result<(), _> = engine
            .execute(URL, "example.com", || {
                calls.set(calls.get() + 1);
                async { Err(server_error()) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, .. })));
        assert_eq!(calls.get(), 3);
        assert_eq!(engine.breaker().failure_count(URL), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let mut engine = engine(3, 5);
        let calls = Cell::new(0);
        let result: Result<(), _> = engine
            .execute(URL, "example.com", || {
                calls.set(calls.get() + 1);
                async {
                    Err(FetchError::Status {
                        url: URL.to_string(),
                        code: 404,
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Permanent(_))));
        assert!(!result.unwrap_err().is_retryable());
        assert_eq!(calls.get(), 1);
        assert_eq!(engine.breaker().failure_count(URL), 0);
        assert_eq!(engine.health().health("example.com"), 1.0);
    }

    #[tokio::test]
    async fn test_open_circuit_makes_no_attempt() {
        let mut engine = engine(0, 5);
        let calls = Cell::new(0);

        for _ in 0..5 {
            let result: Result<(), _> = engine
                .execute(URL, "example.com", || {
                    calls.set(calls.get() + 1);
                    async { Err(server_error()) }
                })
                .await;
            assert!(matches!(result, Err(RetryError::Exhausted { .. })));
        }
        assert_eq!(calls.get(), 5);

        let result: Result<(), _> = engine
            .execute(URL, "example.com", || {
                calls.set(calls.get() + 1);
                async { Err(server_error()) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::CircuitOpen { .. })));
        assert_eq!(calls.get(), 5);
    }

    #[tokio::test]
    async fn test_breaker_trips_mid_call() {
        let mut engine = engine(10, 3);
        let calls = Cell::new(0);
        let result: Result<(), _> = engine
            .execute(URL, "example.com", || {
                calls.set(calls.get() + 1);
                async { Err(server_error()) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::CircuitOpen { .. })));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_half_open_allows_single_attempt() {
        let mut engine = FetchRetryEngine::new(
            policy(3),
            CircuitBreaker::new(1, Duration::from_millis(20)),
        );
        let calls = Cell::new(0);
        let failing = || {
            calls.set(calls.get() + 1);
            async { Err::<(), _>(server_error()) }
        };

        let _ = engine.execute(URL, "example.com", failing).await;
        assert_eq!(calls.get(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let result = engine.execute(URL, "example.com", failing).await;
        assert!(matches!(result, Err(RetryError::CircuitOpen { .. })));
        assert_eq!(calls.get(), 2);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let ok = engine
            .execute(URL, "example.com", || async { Ok::<_, FetchError>(()) })
            .await;
        assert!(ok.is_ok());
        assert_eq!(engine.breaker().failure_count(URL), 0);
    }

    #[test]
    fn test_backoff_non_decreasing() {
        let p = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            jitter: true,
        };
        for health in [1.0, 0.5, 0.1] {
            let mut previous = Duration::ZERO;
            for attempt in 0..10 {
                let delay = p.backoff_delay(attempt, health);
                assert!(delay >= previous);
                previous = delay;
            }
            assert_eq!(previous, Duration::from_secs(5));
        }
    }

    #[test]
    fn test_backoff_scaled_by_health() {
        let p = policy(3);
        assert_eq!(p.backoff_delay(0, 1.0), Duration::from_millis(1));
        assert_eq!(p.backoff_delay(2, 1.0), Duration::from_millis(4));
        assert!(p.backoff_delay(2, 0.5) > p.backoff_delay(2, 1.0));
    }

    #[test]
    fn test_jitter_stays_within_half() {
        let p = RetryPolicy {
            jitter: true,
            ..policy(3)
        };
        let base = Duration::from_millis(1000);
        for _ in 0..100 {
            let d = p.jittered(base);
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(1500));
        }
    }
}
