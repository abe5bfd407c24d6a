//! Retry logic with exponential backoff
//!
//! All retry-with-backoff behavior of the engine goes through this module, so
//! transient failures are invisible above the HTTP client boundary. The delay
//! before retry `n` (starting at zero) is `initial_delay × multiplier^n`,
//! capped at `max_delay`, optionally jittered.
//!
//! # Example
//!
//! ```no_run
//! use frontpage_dl::retry::{IsRetryable, with_retry};
//! use frontpage_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let result = with_retry(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (connection reset, timeout, 429, 5xx) should return `true`.
/// Permanent failures (404, not an image, date mismatch) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Connection failures, timeouts, 429 and 5xx are all mapped here
            Error::Network { .. } => true,
            // Client errors other than 429 will not change on retry
            Error::HttpStatus { .. } => false,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Probe(_)
            | Error::Download(_)
            | Error::StrictDateMismatch { .. }
            | Error::NoCandidates { .. }
            | Error::AllCandidatesFailed { .. }
            | Error::UnknownPublisher(_)
            | Error::AliasCycle(_)
            | Error::Config { .. }
            | Error::InvalidUrl(_)
            | Error::Serialization(_)
            | Error::Other(_) => false,
        }
    }
}

/// Execute an async operation with exponential backoff, retrying errors that
/// implement [`IsRetryable`] and report themselves as transient
///
/// Returns the successful result or the last error after all retry attempts
/// are exhausted.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    retry_if(config, |e: &E| e.is_retryable(), operation).await
}

/// Execute an async operation with exponential backoff, using `should_retry`
/// to decide which errors are transient
///
/// Sleeping only suspends the calling task; other resolutions keep running.
pub async fn retry_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::debug!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if should_retry(&e) && attempt < config.max_attempts => {
                let delay = backoff_delay(config, attempt);
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if should_retry(&e) {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Delay before retry number `attempt` (zero-based), capped and optionally jittered
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = config.backoff_multiplier.powi(attempt as i32);
    let nanos = (config.initial_delay.as_nanos() as f64 * factor).round();
    let base = Duration::from_nanos(nanos.min(u64::MAX as f64) as u64);
    let capped = base.min(config.max_delay);
    if config.jitter {
        add_jitter(capped)
    } else {
        capped
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
