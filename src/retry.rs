//! Retry logic for API requests
//!
//! Two layers cooperate so that a single request can delay a run but never fail it:
//!
//! - [`request_with_retry`] retries one request a bounded number of times. An explicit
//!   rate-limit answer waits for the server-requested duration (or the configured
//!   default); other transient failures back off exponentially with optional jitter.
//! - [`retry_rounds`] wraps an operation in a fixed-interval [`RetryPolicy`]. The
//!   production policy has no round limit; a bounded policy ends in
//!   [`Error::RetriesExhausted`].
//!
//! # Example
//!
//! ```no_run
//! use yougile_sync::config::{RetryConfig, RetryPolicy};
//! use yougile_sync::error::Error;
//! use yougile_sync::retry::{request_with_retry, retry_rounds};
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::default();
//! let policy = RetryPolicy::default();
//! let value = retry_rounds(&policy, "columns page", || {
//!     request_with_retry(&config, || async { Ok::<_, Error>(42) })
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{RetryConfig, RetryPolicy};
use crate::error::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (rate limiting, timeouts, refused connections, 5xx) should return
/// `true`. Permanent failures (bad credentials, unknown resource, undecodable body)
/// should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the request should be retried
    fn is_retryable(&self) -> bool;

    /// Returns true if the server explicitly asked the client to slow down
    fn is_rate_limited(&self) -> bool {
        false
    }

    /// Wait requested by the server, if it sent one
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimited { .. } => true,
            // 408 Request Timeout and server-side errors
            Error::HttpStatus { status, .. } => *status == 408 || *status >= 500,
            Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. }
            | Error::Decode { .. }
            | Error::InvalidUrl(_)
            | Error::Serialization(_)
            | Error::Csv(_)
            | Error::Snapshot(_)
            | Error::Merge(_)
            | Error::RetriesExhausted { .. } => false,
        }
    }

    fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Execute a request with bounded retry
///
/// # Arguments
///
/// * `config` - Retry configuration (max attempts, rate-limit wait, backoff, jitter)
/// * `operation` - Async closure issuing the request; called once per attempt
///
/// # Returns
///
/// The successful result, or the last error once it is not retryable or all
/// `config.max_attempts` retries are used up.
pub async fn request_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                let wait = if e.is_rate_limited() {
                    let wait = e.retry_after().unwrap_or(config.rate_limit_wait);
                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = config.max_attempts,
                        wait_secs = wait.as_secs_f64(),
                        "429 Too Many Requests, waiting before retry"
                    );
                    wait
                } else {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis(),
                        "Request failed, retrying"
                    );
                    let wait = if config.jitter { add_jitter(delay) } else { delay };
                    let next_delay =
                        Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
                            .unwrap_or(config.max_delay);
                    delay = next_delay.min(config.max_delay);
                    wait
                };

                tokio::time::sleep(wait).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Request failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Request failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Repeat an operation at a fixed interval until it succeeds or the policy gives up
///
/// Every error is retried: this is the layer that turns "not obtained yet" into a
/// delay. With `policy.max_rounds = None` it only returns on success.
///
/// # Arguments
///
/// * `policy` - Interval and optional round limit
/// * `what` - Description used in logs and in [`Error::RetriesExhausted`]
/// * `operation` - Async closure performing one full attempt
pub async fn retry_rounds<F, Fut, T>(
    policy: &RetryPolicy,
    what: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut rounds: u32 = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !policy.allows_round(rounds) {
                    tracing::error!(
                        error = %e,
                        what = what,
                        attempts = rounds + 1,
                        "Giving up after retry budget was used"
                    );
                    return Err(Error::RetriesExhausted {
                        what: what.to_string(),
                        attempts: rounds + 1,
                    });
                }
                rounds += 1;
                tracing::warn!(
                    error = %e,
                    what = what,
                    round = rounds,
                    wait_secs = policy.interval.as_secs_f64(),
                    "Data not obtained, waiting and trying again"
                );
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
