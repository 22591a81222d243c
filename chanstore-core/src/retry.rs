//! Retry policy for remote writes
//!
//! Attempt `i` (0-indexed) that fails waits `(i + 1) * unit` before the next
//! attempt. There is no wait after the final attempt. A failure that names
//! its own wait, such as a rate limit, waits at least that long.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Default number of attempts per remote write
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default backoff unit
pub const DEFAULT_RETRY_UNIT: Duration = Duration::from_secs(1);

/// Bounded retries with linear backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Backoff time unit
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            unit: DEFAULT_RETRY_UNIT,
        }
    }
}

/// Every attempt failed
#[derive(Debug)]
pub struct RetryError<E> {
    /// Attempts made
    pub attempts: u32,
    /// Failure of the last attempt
    pub source: E,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed after {} attempts: {}", self.attempts, self.source)
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, unit: Duration) -> Self {
        Self { max_attempts, unit }
    }

    /// Wait after failed attempt `attempt` (0-indexed)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(attempt.saturating_add(1))
    }

    /// Total time spent waiting when every attempt fails
    pub fn total_backoff(&self) -> Duration {
        (0..self.attempts().saturating_sub(1)).fold(Duration::ZERO, |acc, i| {
            acc.saturating_add(self.delay(i))
        })
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Run `operation` until it succeeds or the attempts run out
    ///
    /// `operation` is called with the 0-indexed attempt number. It must
    /// produce the same request every time; callers own the payload it sends.
    pub async fn run<F, Fut, T, E>(&self, what: &str, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run_with_hint(what, operation, |_| None).await
    }

    /// Like [`run`](Self::run), but a failure for which `hint` returns a
    /// wait delays the next attempt by at least that much
    pub async fn run_with_hint<F, Fut, T, E, H>(
        &self,
        what: &str,
        mut operation: F,
        hint: H,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        H: Fn(&E) -> Option<Duration>,
    {
        let attempts = self.attempts();
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 >= attempts => {
                    return Err(RetryError {
                        attempts,
                        source: e,
                    });
                }
                Err(e) => {
                    let delay = match hint(&e) {
                        Some(wait) => wait.max(self.delay(attempt)),
                        None => self.delay(attempt),
                    };
                    warn!(
                        operation = what,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
