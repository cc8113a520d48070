use std::thread::sleep;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Constant-delay retry budget for a store held by another writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Runs `operation`, retrying while it fails with a lock error. Exhausting the
/// budget escalates to `StorageUnavailable`.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    label: &str,
    operation: impl FnMut() -> AppResult<T>,
) -> AppResult<T> {
    with_retry_if(policy, label, AppError::is_transient, operation)
}

pub fn with_retry_if<T>(
    policy: &RetryPolicy,
    label: &str,
    retryable: impl Fn(&AppError) -> bool,
    mut operation: impl FnMut() -> AppResult<T>,
) -> AppResult<T> {
    let mut last_message = String::from("no attempt was made");

    for attempt in 1..=policy.max_attempts {
        match operation() {
            Ok(value) => {
                if attempt > 1 {
                    debug!(target: "app::db", operation = label, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if retryable(&err) => {
                warn!(
                    target: "app::db",
                    operation = label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "storage busy, will retry"
                );
                last_message = err.to_string();
                if attempt < policy.max_attempts && !policy.delay.is_zero() {
                    sleep(policy.delay);
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(AppError::storage_unavailable(
        policy.max_attempts,
        format!("{label}: {last_message}"),
    ))
}
