//! Backoff strategies for gateway failures.
//!
//! Which responses are retried is fixed (see [`crate::status`]); this module
//! only decides how long to wait and whether a ceiling applies.

use rand::Rng;
use std::time::Duration;

/// Defines how long to wait between attempts.
///
/// # Examples
///
/// ```
/// use realm_client::RetryStrategy;
/// use std::time::Duration;
///
/// // Retry until the call's deadline or cancellation: 100ms, 200ms, 400ms...
/// let unbounded = RetryStrategy::default();
///
/// // Same curve, but give up after five retries.
/// let bounded = RetryStrategy::ExponentialBackoff {
///     initial_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(10),
///     max_retries: Some(5),
///     jitter: true,
/// };
///
/// // Never retry.
/// let none = RetryStrategy::None;
/// # let _ = (unbounded, bounded, none);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Do not retry; a gateway failure is returned after the first attempt.
    None,

    /// Retry with exponentially increasing delays.
    ///
    /// Each retry waits for `initial_delay * 2^(retry - 1)`, capped at
    /// `max_delay`. Jitter scales each delay to between 50% and 100%.
    ExponentialBackoff {
        /// The delay before the first retry.
        initial_delay: Duration,
        /// The maximum delay between retries.
        max_delay: Duration,
        /// Ceiling on retries; `None` retries until the call's context ends.
        max_retries: Option<usize>,
        /// Whether to add random jitter to delays.
        jitter: bool,
    },

    /// Retry with a fixed delay between attempts.
    Linear {
        /// The delay between attempts.
        delay: Duration,
        /// Ceiling on retries; `None` retries until the call's context ends.
        max_retries: Option<usize>,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            max_retries: None,
            jitter: true,
        }
    }
}

impl RetryStrategy {
    /// Returns the delay before the given retry, or `None` if retries are exhausted.
    ///
    /// `retry` is 1-indexed: 1 is the wait after the first failed attempt.
    pub fn delay_for_retry(&self, retry: usize) -> Option<Duration> {
        match self {
            RetryStrategy::None => None,
            RetryStrategy::ExponentialBackoff {
                initial_delay,
                max_delay,
                max_retries,
                jitter,
            } => {
                if exhausted(retry, *max_retries) {
                    return None;
                }

                let exponent = retry.saturating_sub(1).min(31) as u32;
                let delay = initial_delay
                    .saturating_mul(2u32.saturating_pow(exponent))
                    .min(*max_delay);

                if *jitter {
                    let factor = rand::thread_rng().gen_range(0.5..=1.0);
                    Some(delay.mul_f64(factor))
                } else {
                    Some(delay)
                }
            }
            RetryStrategy::Linear { delay, max_retries } => {
                if exhausted(retry, *max_retries) {
                    None
                } else {
                    Some(*delay)
                }
            }
        }
    }

    /// Returns the retry ceiling, or `None` if retries are bounded only by
    /// the call's context.
    pub fn max_retries(&self) -> Option<usize> {
        match self {
            RetryStrategy::None => Some(0),
            RetryStrategy::ExponentialBackoff { max_retries, .. } => *max_retries,
            RetryStrategy::Linear { max_retries, .. } => *max_retries,
        }
    }
}

fn exhausted(retry: usize, max_retries: Option<usize>) -> bool {
    max_retries.is_some_and(|max| retry > max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_delays() {
        let strategy = RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            max_retries: Some(5),
            jitter: false,
        };

        assert_eq!(strategy.delay_for_retry(1), Some(Duration::from_millis(100)));
        assert_eq!(strategy.delay_for_retry(2), Some(Duration::from_millis(200)));
        assert_eq!(strategy.delay_for_retry(3), Some(Duration::from_millis(400)));
        assert_eq!(strategy.delay_for_retry(4), Some(Duration::from_millis(800)));
        assert_eq!(strategy.delay_for_retry(5), Some(Duration::from_secs(1)));
        assert_eq!(strategy.delay_for_retry(6), None);
    }

    #[test]
    fn test_default_never_runs_out() {
        let strategy = RetryStrategy::default();
        assert_eq!(strategy.max_retries(), None);
        assert!(strategy.delay_for_retry(1_000).is_some());
        assert!(strategy.delay_for_retry(usize::MAX).unwrap() <= Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let strategy = RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            max_retries: None,
            jitter: true,
        };
        for _ in 0..100 {
            let delay = strategy.delay_for_retry(2).unwrap();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_linear_delays() {
        let strategy = RetryStrategy::Linear {
            delay: Duration::from_secs(1),
            max_retries: Some(3),
        };

        assert_eq!(strategy.delay_for_retry(1), Some(Duration::from_secs(1)));
        assert_eq!(strategy.delay_for_retry(3), Some(Duration::from_secs(1)));
        assert_eq!(strategy.delay_for_retry(4), None);
    }

    #[test]
    fn test_no_retry() {
        let strategy = RetryStrategy::None;
        assert_eq!(strategy.delay_for_retry(1), None);
        assert_eq!(strategy.max_retries(), Some(0));
    }
}
