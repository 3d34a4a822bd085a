//! Outbox row type.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Row, RowKind};

/// Event type emitted when a charge succeeds.
pub const PAYMENT_SUCCEEDED: &str = "payment.succeeded";

/// Delivery state of a [`WebhookEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Waiting for `next_run_at`.
    Pending,
    /// Claimed by a dispatcher until `next_run_at`.
    InFlight,
    /// The endpoint accepted it. Terminal.
    Delivered,
    /// Permanently rejected or out of retries. Terminal.
    Failed,
}

impl EventStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    /// Returns true for `delivered` and `failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued notification about a transaction.
///
/// `payload` is the exact JSON text that will be POSTed; it never changes
/// after the event is enqueued. While the event is `in_flight`,
/// `next_run_at` holds the lease expiry instead of the retry time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: u64,
    pub transaction_id: String,
    pub event_type: String,
    pub payload: String,
    pub target_url: String,
    pub status: EventStatus,
    pub attempts: u32,
    pub next_run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: u64,
}

impl WebhookEvent {
    /// Returns true if a dispatcher should pick this event up at `now`.
    ///
    /// Pending events are due once their retry time has passed; in-flight
    /// events are due again once their lease has expired.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            EventStatus::Pending | EventStatus::InFlight => self.next_run_at <= now,
            EventStatus::Delivered | EventStatus::Failed => false,
        }
    }
}

impl Row for WebhookEvent {
    const KIND: RowKind = RowKind::WebhookEvent;

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
