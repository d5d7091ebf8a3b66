//! # Retry Module
//!
//! Bounded, fixed-delay retry for a single asynchronous unit of work.
//!
//! Every failure is retried the same way: there is no exponential backoff, no
//! jitter and no inspection of the error kind. Once the attempt bound is
//! reached the failure of the last attempt is returned to the caller as-is.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Fixed-delay retry policy.
///
/// # Examples
///
/// ```rust
/// use sheetgate_core::retry::RetryPolicy;
/// use std::time::Duration;
///
/// // Default policy: 8 attempts, 60s between attempts
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 8);
///
/// let policy = RetryPolicy::new(3, Duration::from_secs(5));
/// assert_eq!(policy.delay, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Pause between a failed attempt and the next one
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Number of attempts actually made, never less than one.
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Check whether `attempt` (0-based) is the last one allowed.
    ///
    /// ```rust
    /// use sheetgate_core::retry::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new(3, Duration::ZERO);
    /// assert!(!policy.is_last_attempt(1));
    /// assert!(policy.is_last_attempt(2));
    /// ```
    pub fn is_last_attempt(&self, attempt: u32) -> bool {
        attempt + 1 >= self.effective_attempts()
    }
}

/// Runs units of work under a [`RetryPolicy`].
///
/// The executor has no knowledge of queueing and can be used on its own.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    silent: bool,
}

impl RetryExecutor {
    /// Create an executor for the given policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            silent: false,
        }
    }

    /// Demote per-attempt diagnostics to DEBUG.
    pub fn silenced(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Get the policy used by [`RetryExecutor::run`].
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `work` under the executor's policy.
    ///
    /// `label` identifies the operation in diagnostics only.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sheetgate_core::retry::{RetryExecutor, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let executor = RetryExecutor::new(RetryPolicy::new(3, Duration::ZERO));
    /// let value: Result<u32, String> = executor.run("answer", || async { Ok(42) }).await;
    /// assert_eq!(value, Ok(42));
    /// # }
    /// ```
    pub async fn run<T, E, F, Fut>(&self, label: &str, work: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_with(&self.policy, label, work).await
    }

    /// Run `work` under an explicit policy instead of the configured one.
    pub async fn run_with<T, E, F, Fut>(
        &self,
        policy: &RetryPolicy,
        label: &str,
        mut work: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = policy.effective_attempts();

        for attempt in 0..max_attempts {
            let error = match work().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if policy.is_last_attempt(attempt) {
                if self.silent {
                    debug!(
                        operation = label,
                        attempts = max_attempts,
                        error = %error,
                        "Operation failed after exhausting retries"
                    );
                } else {
                    error!(
                        operation = label,
                        attempts = max_attempts,
                        error = %error,
                        "Operation failed after exhausting retries"
                    );
                }
                return Err(error);
            }

            if self.silent {
                debug!(
                    operation = label,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %error,
                    "Operation failed; retrying"
                );
            } else {
                warn!(
                    operation = label,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %error,
                    "Operation failed; retrying"
                );
            }

            tokio::time::sleep(policy.delay).await;
        }

        unreachable!("retry loop returns on the last attempt")
    }
}

/// Run `work` with an ad-hoc bound and delay.
///
/// Shorthand for a [`RetryExecutor`] built from
/// `RetryPolicy::new(max_attempts, delay)`.
pub async fn run_with_retry<T, E, F, Fut>(
    work: F,
    max_attempts: u32,
    delay: Duration,
    label: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryExecutor::new(RetryPolicy::new(max_attempts, delay))
        .run(label, work)
        .await
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
