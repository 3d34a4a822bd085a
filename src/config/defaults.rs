//! Default values for configuration options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

use std::time::Duration;

/// Default listen address of the HTTP API.
pub const LISTEN: &str = "0.0.0.0:8080";

/// Default webhook target.
pub const WEBHOOK_TARGET: &str = "http://localhost:8081/webhook";

/// Default outbox polling interval in seconds.
pub const POLL_INTERVAL_SECS: u64 = 1;

/// Default per-delivery HTTP timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default bound on concurrent deliveries.
pub const MAX_CONCURRENT: usize = 32;

/// Largest accepted bound on concurrent deliveries.
pub const MAX_CONCURRENT_LIMIT: usize = 4096;

/// Largest accepted value for any duration setting, in seconds (one day).
pub const MAX_DURATION_SECS: u64 = 86_400;

/// Default claim lease in seconds.
pub const LEASE_SECS: u64 = 30;

/// Default number of retries after the first attempt.
pub const RETRY_MAX_RETRIES: u32 = 5;

/// Default initial retry delay in seconds.
pub const RETRY_INITIAL_DELAY_SECS: u64 = 1;

/// Default maximum retry delay in seconds.
pub const RETRY_MAX_DELAY_SECS: u64 = 30;

/// Default retry backoff multiplier.
pub const RETRY_MULTIPLIER: u32 = 2;

/// Default polling interval as Duration.
#[must_use]
pub const fn poll_interval() -> Duration {
    Duration::from_secs(POLL_INTERVAL_SECS)
}

/// Default request timeout as Duration.
#[must_use]
pub const fn request_timeout() -> Duration {
    Duration::from_secs(REQUEST_TIMEOUT_SECS)
}

/// Default claim lease as Duration.
#[must_use]
pub const fn lease() -> Duration {
    Duration::from_secs(LEASE_SECS)
}
