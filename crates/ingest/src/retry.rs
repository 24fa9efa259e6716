//! Bounded retries with linear backoff.
//!
//! Attempt `n` that fails with a retryable error sleeps `base_delay * n`
//! before attempt `n + 1`. Non-retryable errors return immediately. The sleep
//! is split into short slices so a shutdown request cancels the remaining
//! attempts.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

/// Classifies an error as transient (worth retrying) or terminal.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Backoff after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    shutdown: Option<Arc<AtomicBool>>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            shutdown: None,
        }
    }

    /// Stop retrying once `flag` is set.
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `operation` until it succeeds, fails terminally, or the attempt
    /// budget is spent. The last error is returned on exhaustion.
    pub async fn execute<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() {
                warn!(operation = label, attempt, error = %err, "Non-retryable failure");
                return Err(err);
            }
            if attempt >= max_attempts {
                error!(operation = label, attempts = attempt, error = %err, "Retries exhausted");
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                operation = label,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient failure, backing off"
            );
            if !self.backoff(delay).await {
                warn!(operation = label, attempt, "Shutdown requested, abandoning retries");
                return Err(err);
            }
            attempt += 1;
        }
    }

    /// Sleep for `delay`; returns false if shutdown interrupted it.
    async fn backoff(&self, delay: Duration) -> bool {
        let Some(flag) = &self.shutdown else {
            tokio::time::sleep(delay).await;
            return true;
        };

        let mut remaining = delay;
        while !remaining.is_zero() {
            if flag.load(Ordering::SeqCst) {
                return false;
            }
            let step = remaining.min(SLEEP_SLICE);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
        !flag.load(Ordering::SeqCst)
    }
}
