//! Fixed-delay retry for network fetches

use std::time::Duration;

use crate::error::FetchError;

/// How many times to try and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Sleep between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Retry a fallible fetch with a fixed delay between attempts.
///
/// Non-retryable errors (see [`FetchError::is_retryable`]) return at once.
/// Returns `Ok(T)` on first success, or the final `Err` on exhaustion.
pub fn retry_with_backoff<T>(
    label: &str,
    policy: &RetryPolicy,
    mut attempt_fn: impl FnMut() -> Result<T, FetchError>,
) -> Result<T, FetchError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                log::debug!("{label}: attempt {attempt}/{max_attempts} failed: {e}, retrying...");
                attempt += 1;
                if !policy.delay.is_zero() {
                    std::thread::sleep(policy.delay);
                }
            }
            Err(e) => {
                log::warn!("{label}: failed after {attempt} attempt(s): {e}");
                return Err(e);
            }
        }
    }
}
