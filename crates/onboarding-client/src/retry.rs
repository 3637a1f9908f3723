//! Retry utilities with exponential backoff.
//!
//! This module provides utilities for retrying operations that may fail
//! transiently, using exponential backoff to avoid overwhelming the platform.
//! Every wait races a [`CancellationToken`], so a caller can abort a retry
//! loop without waiting out the backoff.
//!
//! # Example
//!
//! ```rust,no_run
//! use onboarding_client::retry::{with_retry_if, RetryPolicy};
//! use tokio_util::sync::CancellationToken;
//! use std::time::Duration;
//!
//! async fn example() {
//!     let policy = RetryPolicy {
//!         max_attempts: 3,
//!         base_delay: Duration::from_millis(100),
//!         max_delay: Duration::from_secs(10),
//!         backoff_multiplier: 2.0,
//!     };
//!
//!     let result = with_retry_if(
//!         &policy,
//!         &CancellationToken::new(),
//!         || async { Ok::<_, std::io::Error>("success".to_string()) },
//!         |_| true,
//!     )
//!     .await;
//!     assert!(result.is_ok());
//! }
//! ```

use crate::error::ApiError;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Retry behavior: how many attempts and how long to wait between them.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Growth factor applied to the delay after each retry (typically 2.0)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Short delays, for reads that usually settle quickly.
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }

    /// Balanced configuration for most use cases.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Longer delays, for calls against a backend under load.
    pub fn slow() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    /// A single attempt and no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay to apply after the given number of failed attempts (1-based).
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()).max(0.0))
    }
}

/// Why a retried operation gave up.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// The error was not retryable; returned after the attempt that raised it.
    Rejected(E),

    /// Every attempt failed with a retryable error.
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last: E,
    },

    /// Cancellation was requested while waiting to retry.
    Canceled {
        /// Attempts made before cancellation.
        attempts: u32,
    },
}

impl<E> RetryError<E> {
    /// The error from the last attempt, unless the loop was canceled.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Rejected(e) | RetryError::Exhausted { last: e, .. } => Some(e),
            RetryError::Canceled { .. } => None,
        }
    }

    /// Consume into the last error.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Rejected(e) | RetryError::Exhausted { last: e, .. } => Some(e),
            RetryError::Canceled { .. } => None,
        }
    }

    /// Whether the loop stopped because of cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, RetryError::Canceled { .. })
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Rejected(e) => write!(f, "{}", e),
            RetryError::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
            RetryError::Canceled { attempts } => {
                write!(f, "canceled after {} attempts", attempts)
            }
        }
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryError::Rejected(e) => e.source(),
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Canceled { .. } => None,
        }
    }
}

/// Execute an API call with retries on transient failures.
///
/// Uses [`ApiError::is_transient`] to decide what to retry.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    f: F,
) -> Result<T, RetryError<ApiError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    with_retry_if(policy, cancel, f, ApiError::is_transient).await
}

/// Execute a function with retries and a custom predicate for retryable errors.
///
/// The function is called up to `max_attempts` times. A non-retryable error
/// is returned at once without consuming the remaining attempts. Between
/// attempts the call sleeps with exponential backoff, or stops early when
/// `cancel` fires.
///
/// # Example
///
/// ```rust,no_run
/// use onboarding_client::retry::{with_retry_if, RetryError, RetryPolicy};
/// use tokio_util::sync::CancellationToken;
///
/// #[derive(Debug)]
/// enum MyError {
///     Transient,
///     Permanent,
/// }
///
/// async fn example() -> Result<(), RetryError<MyError>> {
///     with_retry_if(
///         &RetryPolicy::default(),
///         &CancellationToken::new(),
///         || async { Err(MyError::Transient) },
///         |err| matches!(err, MyError::Transient),
///     )
///     .await
/// }
/// ```
pub async fn with_retry_if<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut f: F,
    mut is_retryable: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Debug,
    P: FnMut(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if !is_retryable(&e) => {
                tracing::debug!(error = ?e, "Error is not retryable, returning immediately");
                return Err(RetryError::Rejected(e));
            }
            Err(e) if attempt >= max_attempts => {
                tracing::error!(attempts = attempt, error = ?e, "All retry attempts exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = ?e,
                    "Attempt failed, retrying"
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!(attempts = attempt, "Retry canceled");
                        return Err(RetryError::Canceled { attempts: attempt });
                    }
                    _ = sleep(delay) => {}
                }
            }
        }
    }
}
