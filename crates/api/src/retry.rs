//! Retry policy for transient request failures.
//!
//! Retryable failures are:
//!
//! - transport errors (connect failures, timeouts, broken bodies)
//! - `429 Too Many Requests`
//! - `5xx` responses other than `501 Not Implemented`
//!
//! Waits grow exponentially from [`RetryPolicy::min_wait`] and are capped at
//! [`RetryPolicy::max_wait`]. A `Retry-After` header on a `429` or `503`
//! response replaces the computed wait; other statuses ignore it.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Configuration for retrying transient failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub min_wait: Duration,
    /// Upper bound for any single wait.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            min_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_wait(mut self, min_wait: Duration, max_wait: Duration) -> Self {
        self.min_wait = min_wait;
        self.max_wait = max_wait.max(min_wait);
        self
    }

    /// Wait before retry number `attempt + 1`, where `attempt` counts from zero.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.min_wait.saturating_mul(factor).min(self.max_wait)
    }

    /// Wait for a retryable response. `Retry-After` is honored on 429 and 503 only.
    pub(crate) fn wait_for_response(
        &self,
        attempt: u32,
        status: StatusCode,
        retry_after: Option<Duration>,
    ) -> Duration {
        let honors_hint = matches!(status, StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE);
        match retry_after.filter(|_| honors_hint) {
            Some(wait) => wait.min(self.max_wait),
            None => self.backoff(attempt),
        }
    }

    pub fn is_retryable_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
            || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
    }

    pub fn is_retryable_error(error: &reqwest::Error) -> bool {
        error.is_connect() || error.is_timeout() || error.is_request() || error.is_body()
    }
}

/// Parse a delay-seconds `Retry-After` header. HTTP-date values are ignored.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
