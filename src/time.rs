//! Time abstraction for testability.
//!
//! This module provides a [`Clock`] trait that allows injecting mock clocks
//! in tests while using the real system clock in production. Row timestamps
//! (`created_at`, `updated_at`, `next_run_at`) are always taken from a
//! [`Clock`], never from `Utc::now()` directly.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Abstraction over wall-clock time.
///
/// # Example
///
/// ```
/// use minipay::time::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let now = clock.now();
/// assert!(now.timestamp() > 0);
/// ```
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock using actual system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Converts a `std` duration into a chrono duration, saturating on overflow.
#[must_use]
pub fn to_chrono(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Furthest a scheduled timestamp may lie ahead of its start, in days.
pub const MAX_HORIZON_DAYS: i64 = 36_500;

/// Returns `start + duration`, clamped to [`MAX_HORIZON_DAYS`] ahead.
///
/// The clamp keeps scheduled timestamps inside the range that row
/// serialization round-trips.
#[must_use]
pub fn saturating_after(start: DateTime<Utc>, duration: std::time::Duration) -> DateTime<Utc> {
    let offset = to_chrono(duration).min(chrono::Duration::days(MAX_HORIZON_DAYS));
    start
        .checked_add_signed(offset)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}


#[cfg(test)]
mod tests {
    use super::mock::MockClock;
    use super::*;
    use std::time::Duration;

    #[test]
    fn system_clock_returns_current_time() {
        let clock = SystemClock;
        let before = Utc::now();
        let result = clock.now();
        let after = Utc::now();

        assert!(result >= before);
        assert!(result <= after);
    }

    #[test]
    fn system_clock_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SystemClock>();
    }

    #[test]
    fn mock_clock_returns_controlled_time() {
        let clock = MockClock::at(1_000_000);
        assert_eq!(clock.now().timestamp(), 1_000_000);
    }

    #[test]
    fn mock_clock_can_advance() {
        let clock = MockClock::at(0);

        clock.advance(Duration::from_secs(100));
        assert_eq!(clock.now().timestamp(), 100);

        clock.advance(Duration::from_millis(50_000));
        assert_eq!(clock.now().timestamp(), 150);
    }

    #[test]
    fn arc_clock_delegates() {
        let clock = Arc::new(MockClock::at(42));
        let shared: Arc<MockClock> = Arc::clone(&clock);

        clock.advance(Duration::from_secs(8));
        assert_eq!(Clock::now(&shared).timestamp(), 50);
    }

    #[test]
    fn to_chrono_saturates() {
        assert_eq!(to_chrono(Duration::from_secs(3)), chrono::Duration::seconds(3));
        assert_eq!(to_chrono(Duration::MAX), chrono::Duration::MAX);
    }

    #[test]
    fn saturating_after_clamps_to_horizon() {
        let start = MockClock::at(0).now();

        assert_eq!(
            saturating_after(start, Duration::from_secs(5)).timestamp(),
            5
        );
        assert_eq!(
            saturating_after(start, Duration::from_secs(u64::MAX)),
            start + chrono::Duration::days(MAX_HORIZON_DAYS)
        );
    }
}
