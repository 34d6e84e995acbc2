//! # Retry Policy Module
//!
//! Exponential backoff for failed webhook deliveries.
//!
//! Attempts are counted from one: after the first failed attempt the job waits
//! `base_delay`, after the second `base_delay * 2`, and so on until
//! `max_attempts` deliveries have been made.

use rand::Rng;
use std::time::Duration;

/// Retry policy configuration for exponential backoff
///
/// # Examples
///
/// ```rust
/// use cms_bridge_service::retry::RetryPolicy;
/// use std::time::Duration;
///
/// // Default policy: 3 attempts, 1s base delay, no jitter
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
/// assert!(!policy.should_retry(3));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total delivery attempts, including the first one
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    pub base_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Jitter range as a fraction of the delay (0.0 disables jitter)
    pub jitter_percent: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(300),
            jitter_percent: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy without jitter
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter_percent: 0.0,
        }
    }

    /// Set jitter percentage (0.0 to 1.0)
    pub fn with_jitter_percent(mut self, percent: f64) -> Self {
        self.jitter_percent = percent.clamp(0.0, 1.0);
        self
    }

    /// Delay to wait after `failed_attempts` deliveries have failed
    ///
    /// Uses `base_delay * 2^(failed_attempts - 1)`, capped at `max_delay`.
    /// A value of zero is treated as one.
    pub fn delay_for_attempt(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.max(1) - 1;
        let base_ms = self.base_delay.as_millis() as f64 * 2f64.powi(exponent as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);

        let final_ms = if self.jitter_percent > 0.0 {
            Self::add_jitter(capped_ms, self.jitter_percent)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms.round() as u64)
    }

    /// Whether another attempt is allowed after `failed_attempts` failures
    ///
    /// ```rust
    /// use cms_bridge_service::retry::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default(); // max_attempts = 3
    ///
    /// assert!(policy.should_retry(1));
    /// assert!(policy.should_retry(2));
    /// assert!(!policy.should_retry(3));
    /// ```
    pub fn should_retry(&self, failed_attempts: u32) -> bool {
        failed_attempts < self.max_attempts
    }

    /// Every delay a job that keeps failing will wait, in order
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts)
            .map(|attempt| self.delay_for_attempt(attempt))
            .collect()
    }

    /// Applies random variation in range [delay * (1-jitter), delay * (1+jitter)]
    fn add_jitter(delay_ms: f64, jitter_percent: f64) -> f64 {
        let jitter_range = delay_ms * jitter_percent;
        if jitter_range <= 0.0 {
            return delay_ms;
        }

        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(-jitter_range..=jitter_range);

        (delay_ms + jitter).max(0.0)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
