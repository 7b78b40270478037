//! Exponential backoff shared by provider calls and readiness polling.
//!
//! Call sites differ only in their bounds (attempt count or elapsed time)
//! and in how they classify a failure, so the loop lives here once and the
//! operation reports each failure as [`Attempt::Permanent`] or
//! [`Attempt::Retryable`].

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_MULTIPLIER: f64 = 1.5;

/// Classification of a single failed attempt.
#[derive(Debug, Eq, PartialEq)]
pub enum Attempt<E> {
    /// The operation can never succeed; stop immediately.
    Permanent(E),
    /// The operation may succeed later; sleep and try again.
    Retryable(E),
}

/// Terminal outcome of a retry loop that did not succeed.
#[derive(Debug, Eq, PartialEq)]
pub enum RetryError<E> {
    /// The operation reported a permanent failure.
    Permanent(E),
    /// The attempt or elapsed-time budget ran out.
    Exhausted {
        /// Failure reported by the final attempt.
        last: E,
        /// Number of attempts made.
        attempts: u32,
    },
}

impl<E> RetryError<E> {
    /// Returns the failure carried by either variant.
    #[must_use]
    pub fn into_inner(self) -> E {
        match self {
            Self::Permanent(err) | Self::Exhausted { last: err, .. } => err,
        }
    }
}

/// Exponential backoff policy.
///
/// Intervals grow by `multiplier` up to `max_interval`. The loop stops once
/// `max_attempts` attempts were made or the next sleep would pass
/// `max_elapsed`, whichever bound is configured first.
#[derive(Clone, Debug, PartialEq)]
pub struct Backoff {
    initial_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
    max_elapsed: Option<Duration>,
    max_attempts: Option<u32>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            multiplier: DEFAULT_MULTIPLIER,
            max_elapsed: None,
            max_attempts: None,
        }
    }
}

impl Backoff {
    /// Policy bounded by total elapsed time.
    #[must_use]
    pub fn with_max_elapsed(initial_interval: Duration, max_elapsed: Duration) -> Self {
        Self {
            initial_interval,
            max_elapsed: Some(max_elapsed),
            ..Self::default()
        }
    }

    /// Policy bounded by a number of attempts.
    #[must_use]
    pub fn with_max_attempts(initial_interval: Duration, max_attempts: u32) -> Self {
        Self {
            initial_interval,
            max_attempts: Some(max_attempts),
            ..Self::default()
        }
    }

    /// Caps the interval between attempts.
    #[must_use]
    pub const fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max_interval)
    }

    /// Runs `operation` until it succeeds, fails permanently, or the policy
    /// is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Permanent`] for a permanent failure and
    /// [`RetryError::Exhausted`] when the budget runs out.
    pub async fn retry<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Attempt<E>>>,
    {
        let started = Instant::now();
        let mut interval = self.initial_interval;
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);
            let last = match operation().await {
                Ok(value) => return Ok(value),
                Err(Attempt::Permanent(err)) => return Err(RetryError::Permanent(err)),
                Err(Attempt::Retryable(err)) => err,
            };

            if self
                .max_attempts
                .is_some_and(|max_attempts| attempts >= max_attempts)
            {
                return Err(RetryError::Exhausted { last, attempts });
            }

            if self
                .max_elapsed
                .is_some_and(|max_elapsed| started.elapsed() + interval > max_elapsed)
            {
                return Err(RetryError::Exhausted { last, attempts });
            }

            sleep(interval).await;
            interval = self.next_interval(interval);
        }
    }
}
