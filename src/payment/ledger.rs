//! Transaction records: creation, refunds and balance.

use std::sync::Arc;

use uuid::Uuid;

use crate::store::{Store, StoreError, WriteBatch};
use crate::time::Clock;

use super::{Balance, ChargeSpec, PaymentError, Transaction, TransactionStatus};

/// Attempts at a refund before a persistent version conflict is reported.
const MAX_REFUND_ATTEMPTS: usize = 3;

/// Owner of all [`Transaction`] rows.
#[derive(Debug)]
pub struct Ledger<S, C> {
    store: Arc<S>,
    clock: C,
}

impl<S, C: Clone> Clone for Ledger<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
        }
    }
}

impl<S: Store, C: Clock> Ledger<S, C> {
    pub const fn new(store: Arc<S>, clock: C) -> Self {
        Self { store, clock }
    }

    /// Builds an unsaved transaction for `spec`.
    ///
    /// Charges settle synchronously, so a new transaction is already
    /// `succeeded`.
    #[must_use]
    pub fn draft(&self, spec: &ChargeSpec) -> Transaction {
        let now = self.clock.now();
        Transaction {
            id: format!("txn_{}", Uuid::new_v4()),
            amount: spec.amount,
            currency: spec.currency.clone(),
            customer: spec.customer.clone(),
            status: TransactionStatus::Succeeded,
            refunded: false,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Validates `spec` and adds a new transaction to `batch`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Validation`] for a bad request.
    pub fn stage_create(
        &self,
        batch: &mut WriteBatch,
        spec: &ChargeSpec,
    ) -> Result<Transaction, PaymentError> {
        spec.validate()?;
        let mut transaction = self.draft(spec);
        batch.create(&mut transaction)?;
        Ok(transaction)
    }

    /// Validates `spec` and records a new transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Validation`] for a bad request, or
    /// [`PaymentError::Infrastructure`] if the row cannot be written.
    pub async fn create(&self, spec: &ChargeSpec) -> Result<Transaction, PaymentError> {
        spec.validate()?;
        let transaction = self.store.create(self.draft(spec)).await?;
        tracing::info!(
            transaction_id = %transaction.id,
            amount = transaction.amount,
            currency = %transaction.currency,
            "Transaction created"
        );
        Ok(transaction)
    }

    /// Looks up a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotFound`] if there is no such transaction.
    pub async fn get(&self, id: &str) -> Result<Transaction, PaymentError> {
        match self.store.get(id).await {
            Ok(transaction) => Ok(transaction),
            Err(StoreError::NotFound { .. }) => Err(PaymentError::NotFound { id: id.to_owned() }),
            Err(e) => Err(e.into()),
        }
    }

    /// Refunds a succeeded transaction in full.
    ///
    /// Concurrent refunds of the same transaction are serialized by the
    /// row version: exactly one succeeds and the rest see
    /// [`PaymentError::AlreadyRefunded`].
    ///
    /// # Errors
    ///
    /// - [`PaymentError::NotFound`] if there is no such transaction
    /// - [`PaymentError::AlreadyRefunded`] if it was refunded before
    /// - [`PaymentError::InvalidState`] if it never succeeded
    pub async fn refund(&self, id: &str) -> Result<Transaction, PaymentError> {
        let mut last_conflict = None;

        for _ in 0..MAX_REFUND_ATTEMPTS {
            let mut transaction = self.get(id).await?;
            if transaction.refunded {
                return Err(PaymentError::AlreadyRefunded { id: id.to_owned() });
            }
            if transaction.status != TransactionStatus::Succeeded {
                return Err(PaymentError::InvalidState {
                    id: id.to_owned(),
                    status: transaction.status,
                });
            }

            transaction.status = TransactionStatus::Refunded;
            transaction.refunded = true;
            transaction.updated_at = self.clock.now();

            match self.store.update(transaction).await {
                Ok(refunded) => {
                    tracing::info!(
                        transaction_id = %refunded.id,
                        amount = refunded.amount,
                        "Transaction refunded"
                    );
                    return Ok(refunded);
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(transaction_id = %id, "Refund raced, re-reading");
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_conflict.map_or_else(
            || PaymentError::NotFound { id: id.to_owned() },
            PaymentError::from,
        ))
    }

    /// Sums the ledger.
    ///
    /// Succeeded amounts count positive and refunded amounts negative;
    /// pending transactions are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Infrastructure`] if the scan fails, or
    /// [`PaymentError::BalanceOverflow`] if the sum does not fit in an `i64`.
    pub async fn compute_balance(&self) -> Result<Balance, PaymentError> {
        let settled: Vec<Transaction> = self
            .store
            .query(|t: &Transaction| {
                matches!(
                    t.status,
                    TransactionStatus::Succeeded | TransactionStatus::Refunded
                )
            })
            .await?;

        settled
            .iter()
            .try_fold(Balance::default(), |mut acc, transaction| {
                let total = if transaction.refunded {
                    acc.refunded_count += 1;
                    acc.balance.checked_sub(transaction.amount)
                } else {
                    acc.successful_count += 1;
                    acc.balance.checked_add(transaction.amount)
                };
                acc.balance = total.ok_or(PaymentError::BalanceOverflow)?;
                Ok(acc)
            })
    }
}
