//! Fixed-delay retry for writes that race against server-side settling.

use std::time::Duration;

use tracing::warn;

use crate::error::{BackendResult, PipelineError, Result};

/// Blocks the current thread between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Retry a retryable failure `max_retries` times, `delay` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    /// Five retries, fifteen seconds apart.
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retries are used up.
    pub fn run<T>(
        &self,
        operation: &str,
        sleeper: &dyn Sleeper,
        mut op: impl FnMut() -> BackendResult<T>,
    ) -> Result<T> {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err.into()),
                Err(err) if attempt >= self.attempts() => {
                    return Err(PipelineError::RetryExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => {
                    warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        operation,
                        attempt,
                        self.attempts(),
                        err,
                        self.delay
                    );
                    sleeper.sleep(self.delay);
                    attempt += 1;
                }
            }
        }
    }
}
