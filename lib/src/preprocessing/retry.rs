//! Bounded retries for auxiliary data fetches.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// How often and how patiently a transient fetch is retried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// No waiting between attempts. Handy for tests and local files.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// runs out of attempts. The last error is returned.
pub fn with_retries<T, F>(policy: &RetryPolicy, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(what, attempt, max_attempts = attempts, error = %e, "retrying");
                if !policy.backoff.is_zero() {
                    std::thread::sleep(policy.backoff);
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Like [`with_retries`], but substitutes `T::default()` once the attempts are
/// exhausted on transient errors. Other errors still propagate.
pub fn or_placeholder<T, F>(policy: &RetryPolicy, what: &str, operation: F) -> Result<T>
where
    T: Default,
    F: FnMut() -> Result<T>,
{
    match with_retries(policy, what, operation) {
        Err(PipelineError::Transient(reason)) => {
            warn!(what, %reason, "giving up, using empty placeholder");
            Ok(T::default())
        }
        other => other,
    }
}
