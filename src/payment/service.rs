//! The payment operations exposed to the HTTP layer.

use std::sync::Arc;

use crate::metrics::{Metrics, MetricsSnapshot};
use crate::store::{RowKind, Store, StoreError};
use crate::time::Clock;
use crate::webhook::{Outbox, PAYMENT_SUCCEEDED};

use super::{
    Balance, ChargeSpec, IdempotencyResolver, Ledger, PaymentError, PaymentNotification,
    Resolution, Transaction,
};

/// Wires the resolver, ledger, outbox and metrics together.
///
/// A new charge commits its transaction, its idempotency key and its
/// `payment.succeeded` event in one batch; the delivery worker picks the
/// event up from there.
#[derive(Debug)]
pub struct PaymentService<S, C> {
    resolver: IdempotencyResolver<S, C>,
    ledger: Ledger<S, C>,
    outbox: Outbox<S, C>,
    metrics: Arc<Metrics>,
    webhook_target: url::Url,
}

impl<S: Store, C: Clock + Clone> PaymentService<S, C> {
    pub fn new(store: Arc<S>, clock: C, metrics: Arc<Metrics>, webhook_target: url::Url) -> Self {
        Self {
            resolver: IdempotencyResolver::new(Arc::clone(&store), clock.clone()),
            ledger: Ledger::new(Arc::clone(&store), clock.clone()),
            outbox: Outbox::new(store, clock),
            metrics,
            webhook_target,
        }
    }
}

impl<S: Store, C: Clock> PaymentService<S, C> {
    /// Creates a charge, or replays the one already bound to `token`.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::Validation`] if `spec` is out of bounds
    /// - [`PaymentError::Infrastructure`] if storage fails
    pub async fn create_charge(
        &self,
        token: Option<&str>,
        spec: &ChargeSpec,
    ) -> Result<Resolution, PaymentError> {
        let outbox = &self.outbox;
        let target = &self.webhook_target;

        let resolution = self
            .resolver
            .resolve_or_create_with(token, spec, |transaction, batch| {
                let payload = serde_json::to_string(&PaymentNotification::from(transaction))
                    .map_err(|source| StoreError::Serialize {
                        kind: RowKind::WebhookEvent,
                        source,
                    })?;
                outbox.stage_enqueue(batch, &transaction.id, PAYMENT_SUCCEEDED, payload, target)?;
                Ok(())
            })
            .await?;

        let transaction = &resolution.transaction;
        if resolution.is_new {
            self.metrics.charge_recorded();
            tracing::info!(
                transaction_id = %transaction.id,
                amount = transaction.amount,
                currency = %transaction.currency,
                customer = %transaction.customer,
                "Charge created"
            );
        } else {
            tracing::info!(
                transaction_id = %transaction.id,
                token = %resolution.token,
                "Charge replayed"
            );
        }
        Ok(resolution)
    }

    /// Refunds a transaction in full.
    ///
    /// # Errors
    ///
    /// See [`Ledger::refund`].
    pub async fn refund(&self, transaction_id: &str) -> Result<Transaction, PaymentError> {
        let transaction = self.ledger.refund(transaction_id).await?;
        self.metrics.refund_recorded();
        Ok(transaction)
    }

    /// Looks up a transaction by id.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotFound`] if there is no such transaction.
    pub async fn transaction(&self, id: &str) -> Result<Transaction, PaymentError> {
        self.ledger.get(id).await
    }

    /// Sums the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Infrastructure`] if the scan fails, or
    /// [`PaymentError::BalanceOverflow`] if the total does not fit.
    pub async fn balance(&self) -> Result<Balance, PaymentError> {
        self.ledger.compute_balance().await
    }

    #[must_use]
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
