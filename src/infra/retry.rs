//! Bounded retry with a fixed delay
//!
//! Shared by mount waiting, serial port discovery and serial port opening.
//! Attempts never run in parallel: each failure sleeps `delay` and tries again
//! until the attempt budget is spent. No sleep follows the final attempt.

use std::time::Duration;

/// Retry budget exhausted
#[derive(Debug)]
pub struct Exhausted<E> {
    /// Attempts made
    pub attempts: u32,
    /// Error from the final attempt
    pub last_error: E,
}

/// Fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Create a policy making at most `max_attempts` attempts (at least one)
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy for "N retries": one initial attempt plus `retries` more
    pub fn with_retries(retries: u32, delay: Duration) -> Self {
        Self::new(retries.saturating_add(1), delay)
    }

    /// Maximum attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempts
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it succeeds or the budget is spent
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run<T, E, F>(&self, op: F) -> Result<T, Exhausted<E>>
    where
        F: FnMut(u32) -> Result<T, E>,
    {
        self.run_with_sleep(op, std::thread::sleep)
    }

    /// Like [`RetryPolicy::run`], with an injectable sleep
    pub fn run_with_sleep<T, E, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, Exhausted<E>>
    where
        F: FnMut(u32) -> Result<T, E>,
        S: FnMut(Duration),
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(Exhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(_) => {
                    tracing::debug!(
                        "attempt {attempt}/{} failed, retrying in {:?}",
                        self.max_attempts,
                        self.delay
                    );
                    sleep(self.delay);
                    attempt += 1;
                }
            }
        }
    }
}
