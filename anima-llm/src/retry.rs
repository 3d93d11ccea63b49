//! Retry with exponential backoff for service-boundary calls.
//!
//! Delay for attempt `n` (0-based) is `initial * 2^n`, capped at `max`,
//! plus up to 10% random jitter.  Errors that [`LlmError::is_retryable`]
//! rejects are returned immediately.

use std::future::Future;
use std::time::Duration;

use anima_core::config::{EmbeddingConfig, LlmConfig};
use rand::Rng;
use tracing::warn;

use crate::error::LlmError;

/// Bounded-attempt backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(4),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Policy for chat completions.
    #[must_use]
    pub fn from_llm_config(config: &LlmConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Policy for embedding batches.
    #[must_use]
    pub fn from_embedding_config(config: &EmbeddingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Base delay (without jitter) before retry number `attempt + 1`.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = base.mul_f64(rand::thread_rng().gen_range(0.0..0.1));
        (base + jitter).min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or
    /// [`LlmError::RetriesExhausted`] carrying the last error message.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 0..attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    last_error = err.to_string();
                    if attempt + 1 < attempts {
                        let delay = self.delay(attempt);
                        warn!(
                            call = label,
                            attempt = attempt + 1,
                            max_attempts = attempts,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                            "retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        Err(LlmError::RetriesExhausted {
            attempts,
            last_error,
        })
    }
}
