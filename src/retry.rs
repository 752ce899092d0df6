/// Retry Module
///
/// Wraps outbound calls with bounded retry and exponential backoff.
/// Errors are classified explicitly so the wrapper never has to guess from
/// error messages whether another attempt makes sense.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::sleep;

/// How a failed call should be treated by the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Server-side or connection-level problem, worth another attempt
    Retryable,
    /// The request itself was rejected (4xx), repeating it won't help
    Permanent,
    /// No status code and no connection problem: a bug or a decode error
    Fatal,
}

/// Errors that know how the retry loop should react to them
pub trait Classify {
    fn classify(&self) -> Failure;
}

/// Classify an HTTP status code
pub fn classify_status(status: StatusCode) -> Failure {
    if status.is_server_error() {
        Failure::Retryable
    } else {
        Failure::Permanent
    }
}

/// Classify a transport error from reqwest
pub fn classify_transport(error: &reqwest::Error) -> Failure {
    if let Some(status) = error.status() {
        return classify_status(status);
    }

    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        Failure::Retryable
    } else {
        Failure::Fatal
    }
}

impl Classify for reqwest::Error {
    fn classify(&self) -> Failure {
        classify_transport(self)
    }
}

impl Classify for teloxide::RequestError {
    fn classify(&self) -> Failure {
        use teloxide::RequestError;

        match self {
            RequestError::Network(e) => classify_transport(e),
            RequestError::RetryAfter(_) => Failure::Retryable,
            RequestError::Api(_) | RequestError::MigrateToChatId(_) => Failure::Permanent,
            _ => Failure::Fatal,
        }
    }
}

/// Retry settings for a single outbound call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt with the given 0-based index
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(self.backoff_factor.saturating_pow(attempt))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of attempts. The last error is always handed back to the caller.
pub async fn with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        match error.classify() {
            Failure::Permanent => {
                log::error!("Non-retryable request error: {}", error);
                return Err(error);
            }
            Failure::Fatal => {
                log::error!("Unexpected error, not retrying: {}", error);
                return Err(error);
            }
            Failure::Retryable => {}
        }

        if attempt + 1 >= max_attempts {
            log::error!("Max retries ({}) exceeded: {}", max_attempts, error);
            return Err(error);
        }

        let delay = policy.delay_after(attempt);
        log::warn!(
            "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
            attempt + 1,
            max_attempts,
            error,
            delay
        );
        sleep(delay).await;
        attempt += 1;
    }
}
