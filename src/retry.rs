//! Retry logic with exponential backoff
//!
//! Network-calling operations are wrapped in bounded retries so a single
//! failing remote call cannot stall a report cycle indefinitely. Transient
//! failures (timeouts, connection errors) are retried; everything else
//! escalates immediately. The wrapper exists in two forms with identical
//! attempt/backoff semantics: [`with_retry`] suspends cooperatively and is
//! used inside the report cycle, [`with_retry_blocking`] sleeps the calling
//! thread and is meant for driving the portal client outside a runtime.

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, connection reset) should return
/// `true`. Permanent failures (bad credentials, malformed responses, invalid
/// configuration) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            // Fetch errors carry the upstream HTTP status or reason in the
            // message; gateway-class statuses are worth another attempt
            Error::Fetch(msg) | Error::Delivery(msg) => {
                msg.contains("timeout")
                    || msg.contains("connection")
                    || msg.contains("temporarily")
                    || msg.contains("502")
                    || msg.contains("503")
            }
            // A rejected credential or a response without access_token will
            // not improve on a second attempt
            Error::Auth(_) => false,
            Error::Config { .. } => false,
            Error::Serialization(_) => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// The operation is attempted at most `config.max_attempts` times in total.
/// Between failed attempts the wrapper waits `initial_delay`, then multiplies
/// the delay by `backoff_multiplier` (capped at `max_delay`). Intermediate
/// failures are logged as warnings, the final one as an error, and the last
/// error is returned unchanged.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 1u32;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "operation failed, retrying"
                );
                let wait = if config.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(wait).await;
                delay = next_delay(delay, config);
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Blocking counterpart of [`with_retry`]
///
/// Identical attempt and backoff semantics; the wait is performed with
/// [`std::thread::sleep`]. Never call this from within an async task.
pub fn with_retry_blocking<F, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 1u32;
    let mut delay = config.initial_delay;

    loop {
        match operation() {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "operation failed, retrying"
                );
                let wait = if config.jitter { add_jitter(delay) } else { delay };
                std::thread::sleep(wait);
                delay = next_delay(delay, config);
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier).min(config.max_delay)
}

/// Add random jitter to a delay
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay falls between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
