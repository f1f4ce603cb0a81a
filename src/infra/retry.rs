//! Bounded retries with exponential backoff and jitter for provider calls
//!
//! Only failures classified as transient by [`RelayError::is_transient`] are
//! retried; validation and configuration errors fail on the first attempt.

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;

use super::RelayError;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = just the initial attempt)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on the delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier per attempt
    pub multiplier: f64,
    /// Jitter factor (0.0-1.0) applied around the computed delay
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::uploads(2)
    }
}

impl RetryConfig {
    /// Preset for pinning uploads: short first delay, capped at a few seconds.
    pub fn uploads(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            multiplier: 2.0,
            jitter: 0.3,
        }
    }

    /// No delay and no jitter, for tests and in-process backends.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter <= 0.0 || capped <= 0.0 {
            return Duration::from_secs_f64(capped);
        }

        let range = capped * self.jitter;
        let offset = rand::thread_rng().gen_range(-range..=range);
        Duration::from_secs_f64((capped + offset).max(0.0))
    }
}

/// Result of a retried operation
#[derive(Debug)]
pub struct RetryResult<T> {
    pub result: Result<T, RelayError>,
    /// Attempts made (1 = succeeded or failed on the first try)
    pub attempts: u32,
}

impl<T> RetryResult<T> {
    pub fn into_result(self) -> Result<T, RelayError> {
        self.result
    }
}

/// Runs provider operations under a [`RetryConfig`]
#[derive(Debug, Clone, Default)]
pub struct Retry {
    config: RetryConfig,
}

impl Retry {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `operation`, retrying transient failures.
    ///
    /// `context` names the operation in logs.
    pub async fn run<F, Fut, T>(&self, context: &str, operation: F) -> RetryResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RelayError>>,
    {
        let start = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match operation().await {
                Ok(value) => {
                    if attempts > 1 {
                        tracing::info!(
                            context,
                            attempts,
                            duration_ms = start.elapsed().as_millis() as u64,
                            "Operation succeeded after retries"
                        );
                    }
                    return RetryResult {
                        result: Ok(value),
                        attempts,
                    };
                }
                Err(e) if !e.is_transient() || attempts > self.config.max_retries => {
                    if e.is_transient() {
                        tracing::warn!(
                            context,
                            attempts,
                            error = %e,
                            "Operation failed after all retries exhausted"
                        );
                    }
                    return RetryResult {
                        result: Err(e),
                        attempts,
                    };
                }
                Err(e) => {
                    let delay = self.config.delay_for_attempt(attempts - 1);
                    tracing::warn!(
                        context,
                        attempt = attempts,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Operation failed, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
