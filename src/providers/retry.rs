//! Retry configuration, delay calculation, and the retrying decorator.
//!
//! Provides [`RetryConfig`] for controlling retry behaviour and
//! [`RetryingInvoker`], which wraps any [`ModelInvoker`] with automatic
//! retry on provider throttling.
//!
//! Only throttling is retried — see [`ChemSnapError::is_transient()`].
//! All retry logic lives in the shared `with_retry()` helper.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use crate::telemetry;

use super::traits::{ModelInvoker, TextStream};
use crate::prompt::Prompt;
use crate::types::InvokeOptions;
use crate::{ChemSnapError, Result};

/// Upper bound on the random jitter added to a backoff delay.
const JITTER_MAX_MS: u64 = 500;

/// Configuration for retry behaviour on throttled requests.
///
/// Uses exponential backoff with randomized jitter, capped at `max_delay`:
///
/// ```rust
/// # use chemsnap::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200))
///     .jitter(false);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 60s.
    pub max_delay: Duration,
    /// Whether to add random jitter to delays. Default: true.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Calculate the base delay for a given attempt number (0-indexed).
    ///
    /// Exponential backoff: `initial_delay * 2^attempt`, capped at
    /// `max_delay`. Does NOT include jitter — see
    /// [`effective_delay()`](Self::effective_delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Calculate the effective delay, respecting provider `retry-after` hints.
    ///
    /// A `retry_after` duration (from a `Throttled` error) takes precedence
    /// over the calculated backoff. Otherwise jitter, when enabled, adds up
    /// to [`JITTER_MAX_MS`] on top of the base delay; the cap still applies.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint;
        }
        let mut delay = self.delay_for_attempt(attempt);
        if self.jitter {
            let extra = rand::thread_rng().gen_range(0..=JITTER_MAX_MS);
            delay = (delay + Duration::from_millis(extra)).min(self.max_delay);
        }
        delay
    }
}

// ============================================================================
// Shared retry helper
// ============================================================================

/// Execute an async operation with retry logic.
///
/// Retries on throttling (as classified by [`ChemSnapError::is_transient()`])
/// up to `config.max_attempts`, using exponential backoff and respecting
/// `retry-after` hints. Every other error is returned immediately.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    provider_name: &str,
    operation: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..config.max_attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                metrics::counter!(telemetry::RETRIES_TOTAL,
                    "provider" => provider_name.to_owned(),
                    "operation" => operation.to_owned(),
                )
                .increment(1);
                if attempt + 1 < config.max_attempts {
                    let delay = config.effective_delay(attempt, e.retry_after());
                    warn!(
                        provider = provider_name,
                        operation,
                        attempt = attempt + 1,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after throttle"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e), // permanent error, no retry
        }
    }
    Err(last_err.unwrap_or(ChemSnapError::NoProvider))
}

// ============================================================================
// RetryingInvoker
// ============================================================================

/// Decorator that wraps a [`ModelInvoker`] with retry logic.
///
/// On throttling, retries with exponential backoff up to
/// `config.max_attempts`, respecting provider `retry-after` hints. Other
/// errors are returned immediately so a failed batch surfaces fast.
pub struct RetryingInvoker {
    inner: Arc<dyn ModelInvoker>,
    config: RetryConfig,
}

impl RetryingInvoker {
    /// Wrap an invoker with retry logic.
    pub fn new(inner: Arc<dyn ModelInvoker>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl ModelInvoker for RetryingInvoker {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn invoke(&self, prompt: &Prompt, options: &InvokeOptions) -> Result<String> {
        with_retry(&self.config, self.inner.name(), "invoke", || {
            self.inner.invoke(prompt, options)
        })
        .await
    }

    async fn invoke_stream(
        &self,
        prompt: &Prompt,
        options: &InvokeOptions,
    ) -> Result<TextStream> {
        // Retry only the initial connection, not mid-stream failures.
        with_retry(&self.config, self.inner.name(), "invoke_stream", || {
            self.inner.invoke_stream(prompt, options)
        })
        .await
    }
}
