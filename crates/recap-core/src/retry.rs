//! Explicit retry policy for transient upstream failures.
//!
//! A policy is a value (attempt ceiling plus fixed backoff) applied at the
//! call site together with a retryable-condition predicate, rather than a
//! wrapper around arbitrary functions. The backoff sleep is local to the
//! calling task and never blocks unrelated jobs.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempt ceiling and fixed backoff between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying while `retryable` holds and attempts remain.
    ///
    /// Sleeps `backoff` between attempts. A non-retryable error or an
    /// exhausted ceiling returns the last error to the caller.
    pub async fn run<T, E, F, Fut, P>(&self, label: &str, retryable: P, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if retryable(&error) && attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_secs = self.backoff.as_secs_f32(),
                        error = %error,
                        "{} failed, retrying after backoff",
                        label
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
