//! Retry schedule for failed webhook deliveries.

use std::time::Duration;

/// Exponential backoff without jitter.
///
/// The delay after the `n`th failed attempt is
/// `min(max_delay, initial_delay * multiplier^(n-1))`, so with the defaults
/// the schedule is 1s, 2s, 4s, 8s, 16s, 30s, 30s, ...
///
/// # Defaults
///
/// - `max_retries`: 5
/// - `initial_delay`: 1 second
/// - `max_delay`: 30 seconds
/// - `multiplier`: 2
///
/// # Example
///
/// ```
/// use minipay::webhook::BackoffPolicy;
/// use std::time::Duration;
///
/// let policy = BackoffPolicy::default();
/// assert_eq!(policy.delay(3), Duration::from_secs(4));
///
/// let custom = BackoffPolicy::new()
///     .with_max_retries(3)
///     .with_initial_delay(Duration::from_millis(500));
/// assert_eq!(custom.delay(2), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Failed attempts tolerated before an event is marked failed.
    ///
    /// An event whose attempt count exceeds this value is terminal.
    pub max_retries: u32,

    /// Delay after the first failed attempt.
    pub initial_delay: Duration,

    /// Upper bound on any single delay.
    pub max_delay: Duration,

    /// Growth factor between consecutive delays.
    pub multiplier: u32,
}

impl BackoffPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 5;

    pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

    pub const DEFAULT_MULTIPLIER: u32 = 2;

    /// Creates a policy with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            initial_delay: Self::DEFAULT_INITIAL_DELAY,
            max_delay: Self::DEFAULT_MAX_DELAY,
            multiplier: Self::DEFAULT_MULTIPLIER,
        }
    }

    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth factor.
    ///
    /// # Panics
    ///
    /// Panics if `multiplier` is zero.
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: u32) -> Self {
        assert!(multiplier >= 1, "multiplier must be at least 1");
        self.multiplier = multiplier;
        self
    }

    /// Returns the wait after the given failed attempt (1-based).
    ///
    /// Attempt `0` is treated as `1`. Overflow saturates to `max_delay`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        self.multiplier
            .checked_pow(exponent)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Returns true once `attempts` failed attempts exhaust the retry budget.
    #[must_use]
    pub const fn is_exhausted(&self, attempts: u32) -> bool {
        attempts > self.max_retries
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new()
    }
}
