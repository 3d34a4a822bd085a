//! Durable queue of pending webhook notifications.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::store::{RowKind, Store, StoreError, WriteBatch};
use crate::time::{Clock, saturating_after};

use super::{BackoffPolicy, EventStatus, WebhookEvent};

/// Owner of all [`WebhookEvent`] rows.
///
/// Events move through `pending → in_flight → delivered | failed`, with
/// `in_flight → pending` whenever a transient failure schedules a retry.
/// Every transition is an optimistic update, so two dispatchers racing on
/// the same event cannot both win.
#[derive(Debug)]
pub struct Outbox<S, C> {
    store: Arc<S>,
    clock: C,
    backoff: BackoffPolicy,
    lease: Duration,
}

impl<S, C: Clone> Clone for Outbox<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            backoff: self.backoff,
            lease: self.lease,
        }
    }
}

impl<S, C> Outbox<S, C> {
    /// Default time an event stays claimed before it is considered abandoned.
    pub const DEFAULT_LEASE: Duration = Duration::from_secs(30);

    /// Creates an outbox with the default backoff and lease.
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self {
            store,
            clock,
            backoff: BackoffPolicy::default(),
            lease: Self::DEFAULT_LEASE,
        }
    }

    #[must_use]
    pub const fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the claim lease.
    ///
    /// The lease must outlast one delivery attempt (the HTTP timeout), or a
    /// slow attempt will be re-dispatched while still running.
    #[must_use]
    pub const fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    #[must_use]
    pub const fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }
}

impl<S: Store, C: Clock> Outbox<S, C> {
    /// Builds a fresh `pending` event due immediately.
    ///
    /// The id is allocated from the store; nothing is written yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if an id cannot be allocated.
    pub fn new_event(
        &self,
        transaction_id: &str,
        event_type: &str,
        payload: String,
        target_url: &url::Url,
    ) -> Result<WebhookEvent, StoreError> {
        let id = self.store.next_id(RowKind::WebhookEvent)?;
        let now = self.clock.now();
        Ok(WebhookEvent {
            id,
            transaction_id: transaction_id.to_owned(),
            event_type: event_type.to_owned(),
            payload,
            target_url: target_url.to_string(),
            status: EventStatus::Pending,
            attempts: 0,
            next_run_at: now,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Adds a new event to `batch`, to be committed with the caller's rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the event cannot be built or encoded.
    pub fn stage_enqueue(
        &self,
        batch: &mut WriteBatch,
        transaction_id: &str,
        event_type: &str,
        payload: String,
        target_url: &url::Url,
    ) -> Result<WebhookEvent, StoreError> {
        let mut event = self.new_event(transaction_id, event_type, payload, target_url)?;
        batch.create(&mut event)?;
        Ok(event)
    }

    /// Writes a new event on its own.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the event cannot be persisted.
    pub async fn enqueue(
        &self,
        transaction_id: &str,
        event_type: &str,
        payload: String,
        target_url: &url::Url,
    ) -> Result<WebhookEvent, StoreError> {
        let event = self.new_event(transaction_id, event_type, payload, target_url)?;
        self.store.create(event).await
    }

    /// Reads one event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no event has this id.
    pub async fn get(&self, id: u64) -> Result<WebhookEvent, StoreError> {
        self.store.get(&id.to_string()).await
    }

    /// Returns events a dispatcher should pick up at `now`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the scan fails.
    pub async fn due_events(&self, now: DateTime<Utc>) -> Result<Vec<WebhookEvent>, StoreError> {
        let mut due: Vec<WebhookEvent> = self
            .store
            .query(move |e: &WebhookEvent| e.is_due(now))
            .await?;
        due.sort_by_key(|e| (e.next_run_at, e.id));
        Ok(due)
    }

    /// Takes exclusive ownership of a due event for one delivery attempt.
    ///
    /// Returns `None` if the event is no longer due or another dispatcher
    /// claimed it first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for failures other than losing the race.
    pub async fn claim(&self, mut event: WebhookEvent) -> Result<Option<WebhookEvent>, StoreError> {
        let now = self.clock.now();
        if !event.is_due(now) {
            return Ok(None);
        }

        event.status = EventStatus::InFlight;
        event.next_run_at = saturating_after(now, self.lease);
        event.updated_at = now;

        match self.store.update(event).await {
            Ok(claimed) => Ok(Some(claimed)),
            Err(StoreError::Conflict { key, .. }) => {
                tracing::debug!(event_id = %key, "Event claimed by another dispatcher");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Records a successful attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the lease was lost meanwhile.
    pub async fn mark_delivered(&self, event: WebhookEvent) -> Result<WebhookEvent, StoreError> {
        self.finish(event, EventStatus::Delivered).await
    }

    /// Records a permanently failed attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the lease was lost meanwhile.
    pub async fn mark_failed(&self, event: WebhookEvent) -> Result<WebhookEvent, StoreError> {
        self.finish(event, EventStatus::Failed).await
    }

    /// Records a transiently failed attempt.
    ///
    /// The event goes back to `pending` after the backoff for its new
    /// attempt count, or to `failed` once the retry budget is spent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the lease was lost meanwhile.
    pub async fn schedule_retry(&self, mut event: WebhookEvent) -> Result<WebhookEvent, StoreError> {
        let now = self.clock.now();
        event.attempts += 1;
        event.updated_at = now;

        if self.backoff.is_exhausted(event.attempts) {
            event.status = EventStatus::Failed;
        } else {
            event.status = EventStatus::Pending;
            event.next_run_at = saturating_after(now, self.backoff.delay(event.attempts));
        }

        self.store.update(event).await
    }

    /// Counts events that have not reached a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the scan fails.
    pub async fn count_pending(&self) -> Result<u64, StoreError> {
        let open: Vec<WebhookEvent> = self
            .store
            .query(|e: &WebhookEvent| !e.status.is_terminal())
            .await?;
        Ok(open.len() as u64)
    }

    async fn finish(
        &self,
        mut event: WebhookEvent,
        status: EventStatus,
    ) -> Result<WebhookEvent, StoreError> {
        event.attempts += 1;
        event.status = status;
        event.updated_at = self.clock.now();
        self.store.update(event).await
    }
}
