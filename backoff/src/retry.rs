use std::time::Duration;

use crate::strategy::fixed::Interval;

/// Raised when the last permitted attempt failed. Callers decide what to do with the data they
/// could not write.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    #[error("Retry failed: total {attempts} attempts made")]
    Exhausted { attempts: u16 },
}

/// The states a [`RetryStrategy`] moves through:
/// ```text
///                (error)                      (error, attempt < max)
///   Idle ------------------> Retrying(n) ----------------------------> Retrying(n + 1)
///     \                          \
///      \ (error, max == 1)        \ (error, attempt == max)
///       `-------------------------> Exhausted
/// ```
/// A successful attempt simply ends the loop, the strategy is not reused afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// No attempt has failed yet.
    Idle,
    /// `attempt` attempts have failed, at least one more is allowed.
    Retrying { attempt: u16 },
    /// Every permitted attempt failed.
    Exhausted,
}

/// Counts failed attempts against a fixed maximum. Attempts are immediate unless an
/// [`Interval`] is attached, in which case [`RetryStrategy::error_occurred`] hands back the
/// delay to wait before the next attempt.
///
/// One instance covers one logical write. Create a new one for every independent write instead
/// of sharing it, otherwise an exhausted strategy silently disables all later writes.
///
/// ```
/// use backoff::RetryStrategy;
///
/// let mut retry = RetryStrategy::new(2);
/// assert!(retry.should_retry());
/// assert!(retry.error_occurred().is_ok());
/// assert!(retry.should_retry());
/// assert!(retry.error_occurred().is_err());
/// assert!(!retry.should_retry());
/// ```
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    max_attempts: u16,
    state: RetryState,
    interval: Option<Interval>,
}

impl RetryStrategy {
    pub const DEFAULT_MAX_ATTEMPTS: u16 = 3;

    /// Creates a strategy allowing `max_attempts` attempts in total. At least one attempt is
    /// always allowed.
    pub fn new(max_attempts: u16) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            state: RetryState::Idle,
            interval: None,
        }
    }

    /// Waits `interval` between attempts instead of retrying immediately.
    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = Some(interval);
        self
    }

    /// True while the next attempt number is still within `max_attempts`.
    pub fn should_retry(&self) -> bool {
        self.state != RetryState::Exhausted
    }

    /// Records a failed attempt. Returns the delay to observe before the next attempt, or
    /// [`RetryError::Exhausted`] once the failed attempt was the last permitted one.
    pub fn error_occurred(&mut self) -> Result<Option<Duration>, RetryError> {
        let attempt = self.attempt() + 1;
        if attempt >= self.max_attempts {
            self.state = RetryState::Exhausted;
            return Err(RetryError::Exhausted {
                attempts: self.max_attempts,
            });
        }

        self.state = RetryState::Retrying { attempt };
        Ok(self.interval.as_mut().and_then(Iterator::next))
    }

    /// Number of failed attempts recorded so far.
    pub fn attempt(&self) -> u16 {
        match self.state {
            RetryState::Idle => 0,
            RetryState::Retrying { attempt } => attempt,
            RetryState::Exhausted => self.max_attempts,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    pub fn max_attempts(&self) -> u16 {
        self.max_attempts
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}
