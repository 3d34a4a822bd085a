//! In-process counters for charges, refunds, and webhook delivery.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters shared between the HTTP handlers and the delivery worker.
///
/// Share it with `Arc<Metrics>`; every method takes `&self`.
#[derive(Debug, Default)]
pub struct Metrics {
    charges: AtomicU64,
    refunds: AtomicU64,
    pending: AtomicI64,
    delivered: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
}

/// A point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_charges: u64,
    pub total_refunds: u64,
    pub pending_webhooks: i64,
    pub delivered_webhooks: u64,
    pub failed_webhooks: u64,
    pub webhook_retries: u64,
}

impl Metrics {
    /// Creates a collector with every counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pending gauge, typically from the outbox at startup.
    pub fn seed_pending(&self, pending: u64) {
        let pending = i64::try_from(pending).unwrap_or(i64::MAX);
        self.pending.store(pending, Ordering::Relaxed);
    }

    /// A new charge was created and its webhook queued.
    pub fn charge_recorded(&self) {
        self.charges.fetch_add(1, Ordering::Relaxed);
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    /// A charge was refunded.
    pub fn refund_recorded(&self) {
        self.refunds.fetch_add(1, Ordering::Relaxed);
    }

    /// A webhook reached `delivered`.
    pub fn delivery_succeeded(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.pending.fetch_sub(1, Ordering::Relaxed);
    }

    /// A webhook reached `failed`.
    pub fn delivery_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.pending.fetch_sub(1, Ordering::Relaxed);
    }

    /// A webhook attempt failed transiently and was rescheduled.
    pub fn delivery_retried(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter.
    ///
    /// Counters are read one at a time, so a snapshot taken during a
    /// delivery may be off by one between fields.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_charges: self.charges.load(Ordering::Relaxed),
            total_refunds: self.refunds.load(Ordering::Relaxed),
            pending_webhooks: self.pending.load(Ordering::Relaxed),
            delivered_webhooks: self.delivered.load(Ordering::Relaxed),
            failed_webhooks: self.failed.load(Ordering::Relaxed),
            webhook_retries: self.retries.load(Ordering::Relaxed),
        }
    }
}
