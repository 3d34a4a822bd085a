//! Background delivery of outbox events.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderName, HeaderValue};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;

use crate::metrics::Metrics;
use crate::store::{Store, StoreError};
use crate::time::Clock;

use super::{
    DeliveryError, EventStatus, HttpClient, HttpRequest, IsRetryable, Outbox, WebhookEvent,
};

const WEBHOOK_EVENT: &str = "x-webhook-event";
const WEBHOOK_DELIVERY: &str = "x-webhook-delivery";

/// Performs single delivery attempts and records their outcome.
pub struct Deliverer<S, H, C> {
    outbox: Outbox<S, C>,
    client: H,
    metrics: Arc<Metrics>,
}

impl<S, H, C> Deliverer<S, H, C>
where
    S: Store,
    H: HttpClient,
    C: Clock,
{
    pub const fn new(outbox: Outbox<S, C>, client: H, metrics: Arc<Metrics>) -> Self {
        Self {
            outbox,
            client,
            metrics,
        }
    }

    #[must_use]
    pub const fn outbox(&self) -> &Outbox<S, C> {
        &self.outbox
    }

    /// Sends one claimed event and persists the resulting status.
    ///
    /// Delivery failures never surface as errors; they are classified and
    /// written to the event row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the outcome cannot be recorded, including
    /// [`StoreError::Conflict`] when the claim expired and another
    /// dispatcher took the event over.
    pub async fn deliver(&self, event: WebhookEvent) -> Result<EventStatus, StoreError> {
        let id = event.id;
        match self.attempt(&event).await {
            Ok(()) => {
                let event = self.outbox.mark_delivered(event).await?;
                self.metrics.delivery_succeeded();
                tracing::info!(event_id = id, attempts = event.attempts, "Webhook delivered");
                Ok(event.status)
            }
            Err(e) if e.is_retryable() => {
                let event = self.outbox.schedule_retry(event).await?;
                if event.status == EventStatus::Failed {
                    self.metrics.delivery_failed();
                    tracing::warn!(
                        event_id = id,
                        attempts = event.attempts,
                        error = %e,
                        "Webhook retries exhausted"
                    );
                } else {
                    self.metrics.delivery_retried();
                    tracing::warn!(
                        event_id = id,
                        attempts = event.attempts,
                        next_run_at = %event.next_run_at,
                        error = %e,
                        "Webhook attempt failed, retry scheduled"
                    );
                }
                Ok(event.status)
            }
            Err(e) => {
                let event = self.outbox.mark_failed(event).await?;
                self.metrics.delivery_failed();
                tracing::warn!(
                    event_id = id,
                    attempts = event.attempts,
                    error = %e,
                    "Webhook failed permanently"
                );
                Ok(event.status)
            }
        }
    }

    async fn attempt(&self, event: &WebhookEvent) -> Result<(), DeliveryError> {
        serde_json::from_str::<serde_json::Value>(&event.payload)
            .map_err(DeliveryError::MalformedPayload)?;

        let url = url::Url::parse(&event.target_url).map_err(|e| DeliveryError::InvalidTarget {
            url: event.target_url.clone(),
            reason: e.to_string(),
        })?;
        let event_type = HeaderValue::from_str(&event.event_type)
            .map_err(|_| DeliveryError::InvalidHeader(event.event_type.clone()))?;

        let request = HttpRequest::post(url)
            .with_header(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .with_header(HeaderName::from_static(WEBHOOK_EVENT), event_type)
            .with_header(
                HeaderName::from_static(WEBHOOK_DELIVERY),
                HeaderValue::from(event.id),
            )
            .with_body(event.payload.clone().into_bytes());

        let response = self.client.request(request).await?;
        let status = response.status;
        let body = || response.body_text().map(ToString::to_string);

        if status.is_success() {
            Ok(())
        } else if status.is_client_error() {
            Err(DeliveryError::Rejected {
                status,
                body: body(),
            })
        } else {
            Err(DeliveryError::NonSuccessStatus {
                status,
                body: body(),
            })
        }
    }
}

/// Tunables for [`DeliveryWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOptions {
    /// How often the outbox is scanned for due events.
    pub poll_interval: Duration,
    /// Upper bound on deliveries running at once.
    pub max_concurrent: usize,
}

impl WorkerOptions {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

    pub const DEFAULT_MAX_CONCURRENT: usize = 32;
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            max_concurrent: Self::DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// Polls the outbox and fans deliveries out to background tasks.
///
/// Each tick claims as many due events as there are free delivery slots and
/// spawns one task per claimed event. Events left over stay unclaimed and
/// are picked up by a later tick.
pub struct DeliveryWorker<S, H, C> {
    deliverer: Arc<Deliverer<S, H, C>>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
    poll_interval: Duration,
}

impl<S, H, C> DeliveryWorker<S, H, C>
where
    S: Store + 'static,
    H: HttpClient + 'static,
    C: Clock + 'static,
{
    #[must_use]
    pub fn new(deliverer: Deliverer<S, H, C>, options: WorkerOptions) -> Self {
        Self {
            deliverer: Arc::new(deliverer),
            permits: Arc::new(Semaphore::new(options.max_concurrent)),
            tasks: JoinSet::new(),
            poll_interval: options.poll_interval,
        }
    }

    /// Returns the number of deliveries currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Runs one poll cycle and returns how many deliveries were started.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the outbox cannot be scanned or claimed.
    pub async fn tick(&mut self) -> Result<usize, StoreError> {
        self.reap_finished();

        let outbox = self.deliverer.outbox();
        let due = outbox.due_events(outbox.clock().now()).await?;
        let mut dispatched = 0;

        for event in due {
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                tracing::debug!(in_flight = self.tasks.len(), "Delivery slots full");
                break;
            };
            let Some(claimed) = outbox.claim(event).await? else {
                continue;
            };

            tracing::debug!(
                event_id = claimed.id,
                attempt = claimed.attempts + 1,
                "Dispatching webhook"
            );
            let deliverer = Arc::clone(&self.deliverer);
            self.tasks.spawn(async move {
                let _permit = permit;
                let id = claimed.id;
                if let Err(e) = deliverer.deliver(claimed).await {
                    tracing::error!(event_id = id, error = %e, "Failed to record delivery outcome");
                }
            });
            dispatched += 1;
        }

        Ok(dispatched)
    }

    /// Waits for every running delivery to finish.
    pub async fn drain(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            log_join_result(result);
        }
    }

    /// Polls until `shutdown` resolves, then drains running deliveries.
    pub async fn run(mut self, shutdown: impl Future<Output = ()> + Send) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(ticker);
        tokio::pin!(shutdown);

        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis(),
            "Delivery worker started"
        );

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    tracing::info!(in_flight = self.tasks.len(), "Delivery worker stopping");
                    break;
                }

                Some(_) = ticks.next() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "Outbox poll failed");
                    }
                }
            }
        }

        self.drain().await;
        tracing::info!("Delivery worker stopped");
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            log_join_result(result);
        }
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Delivery task panicked");
    }
}
