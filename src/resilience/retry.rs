//! # Retry Executor
//!
//! Runs an async operation and retries retryable failures with exponential
//! backoff. This is the only place backoff delays are computed.
//!
//! ```rust
//! use publishing_core::models::Platform;
//! use publishing_core::orchestration::errors::PublishingError;
//! use publishing_core::resilience::{with_retry, ManualClock, RetryContext, RetryPolicy};
//!
//! # tokio_test::block_on(async {
//! let clock = ManualClock::default();
//! let context = RetryContext::new(Platform::YouTube, "upload");
//! let result = with_retry(
//!     || async { Ok::<_, PublishingError>("video-id") },
//!     &RetryPolicy::default(),
//!     &context,
//!     &clock,
//! )
//! .await;
//! assert_eq!(result.unwrap(), "video-id");
//! # });
//! ```

use super::clock::Clock;
use crate::config::ConfigurationError;
use crate::constants::retry_defaults;
use crate::models::Platform;
use crate::orchestration::errors::PublishingError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Backoff policy for one uploader call site
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// When set, only errors with one of these codes are retried
    pub retryable_codes: Option<Vec<String>>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry_defaults::MAX_ATTEMPTS,
            base_delay: Duration::from_millis(retry_defaults::BASE_DELAY_MS),
            max_delay: Duration::from_millis(retry_defaults::MAX_DELAY_MS),
            backoff_multiplier: retry_defaults::BACKOFF_MULTIPLIER,
            retryable_codes: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            backoff_multiplier,
            retryable_codes: None,
        }
    }

    pub fn with_retryable_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_codes = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_multiplier",
                format!("must be >= 1.0, got {}", self.backoff_multiplier),
            ));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigurationError::invalid_value(
                "retry.max_delay",
                "must not be smaller than base_delay",
            ));
        }
        Ok(())
    }

    /// `min(base_delay * multiplier^(attempt-1), max_delay)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.powi(exponent);
        let millis = self.base_delay.as_millis() as f64 * factor;
        let max_millis = self.max_delay.as_millis() as f64;

        if !millis.is_finite() || millis >= max_millis {
            self.max_delay
        } else {
            Duration::from_millis(millis as u64)
        }
    }

    /// Whether `error` qualifies for another attempt under this policy
    pub fn should_retry(&self, error: &PublishingError) -> bool {
        if !error.is_retryable() {
            return false;
        }
        match &self.retryable_codes {
            Some(codes) => codes.iter().any(|code| code == error.code()),
            None => true,
        }
    }
}

/// Where a retried operation runs, for logging and error attribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryContext {
    pub platform: Platform,
    pub operation: String,
    pub task_id: Option<Uuid>,
}

impl RetryContext {
    pub fn new(platform: Platform, operation: impl Into<String>) -> Self {
        Self {
            platform,
            operation: operation.into(),
            task_id: None,
        }
    }

    pub fn for_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }
}

/// Run `operation` until it succeeds, fails permanently, or the policy's
/// attempts are used up.
///
/// Failures are normalized to [`PublishingError`] (attributed to the
/// context's platform when they carry none). A `max_attempts` of zero is
/// treated as one.
pub async fn with_retry<T, E, F, Fut>(
    mut operation: F,
    policy: &RetryPolicy,
    context: &RetryContext,
    clock: &dyn Clock,
) -> Result<T, PublishingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<PublishingError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        platform = %context.platform,
                        operation = %context.operation,
                        task_id = ?context.task_id,
                        attempt = attempt,
                        "✅ Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(error) => PublishingError::from_source(error).or_platform(context.platform),
        };

        if !policy.should_retry(&error) || attempt >= max_attempts {
            debug!(
                platform = %context.platform,
                operation = %context.operation,
                task_id = ?context.task_id,
                attempt = attempt,
                max_attempts = max_attempts,
                retryable = error.is_retryable(),
                error_code = error.code(),
                "❌ Giving up on operation"
            );
            return Err(error);
        }

        let delay = policy.delay_for_attempt(attempt);
        warn!(
            platform = %context.platform,
            operation = %context.operation,
            task_id = ?context.task_id,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "🔄 Retry attempt {}/{}",
            attempt,
            max_attempts
        );
        clock.sleep(delay).await;
        attempt += 1;
    }
}
