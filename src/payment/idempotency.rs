//! Exactly-once charge creation keyed by a client token.

use std::sync::Arc;

use uuid::Uuid;

use crate::store::{RowKind, Store, StoreError, WriteBatch};
use crate::time::Clock;

use super::{ChargeSpec, IdempotencyKey, Ledger, PaymentError, Transaction};

/// Result of resolving an idempotency token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub transaction: Transaction,
    /// The token the transaction is bound to (minted if none was supplied).
    pub token: String,
    /// False when the token was already bound and the request is a replay.
    pub is_new: bool,
}

/// Owner of all [`IdempotencyKey`] rows.
///
/// A token is bound to a transaction in the same batch that creates the
/// transaction, so two requests racing on one token produce one row.
#[derive(Debug)]
pub struct IdempotencyResolver<S, C> {
    store: Arc<S>,
    ledger: Ledger<S, C>,
    clock: C,
}

impl<S: Store, C: Clock + Clone> IdempotencyResolver<S, C> {
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self {
            ledger: Ledger::new(Arc::clone(&store), clock.clone()),
            store,
            clock,
        }
    }
}

impl<S: Store, C: Clock> IdempotencyResolver<S, C> {
    /// Returns the transaction bound to `token`, creating it if needed.
    ///
    /// # Errors
    ///
    /// See [`resolve_or_create_with`](Self::resolve_or_create_with).
    pub async fn resolve_or_create(
        &self,
        token: Option<&str>,
        spec: &ChargeSpec,
    ) -> Result<Resolution, PaymentError> {
        self.resolve_or_create_with(token, spec, |_, _| Ok(())).await
    }

    /// Like [`resolve_or_create`](Self::resolve_or_create), but lets the
    /// caller stage extra rows that commit only if the transaction does.
    ///
    /// An absent or blank token is replaced by a fresh UUID. A replayed
    /// token returns the original transaction even if `spec` differs.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::Validation`] if `spec` is out of bounds
    /// - [`PaymentError::Infrastructure`] if storage fails, or if the token
    ///   points at a transaction that does not exist
    pub async fn resolve_or_create_with<F>(
        &self,
        token: Option<&str>,
        spec: &ChargeSpec,
        stage: F,
    ) -> Result<Resolution, PaymentError>
    where
        F: FnOnce(&Transaction, &mut WriteBatch) -> Result<(), StoreError> + Send,
    {
        spec.validate()?;

        let token = match token.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_owned(),
            _ => Uuid::new_v4().to_string(),
        };

        if let Some(existing) = self.lookup(&token).await? {
            tracing::debug!(token = %token, transaction_id = %existing.transaction.id, "Idempotent replay");
            return Ok(existing);
        }

        let mut batch = WriteBatch::new();
        let transaction = self.ledger.stage_create(&mut batch, spec)?;
        let mut key = IdempotencyKey {
            id: token.clone(),
            transaction_id: transaction.id.clone(),
            created_at: self.clock.now(),
            version: 0,
        };
        batch.create(&mut key)?;
        stage(&transaction, &mut batch)?;

        match self.store.apply(batch).await {
            Ok(()) => Ok(Resolution {
                transaction,
                token,
                is_new: true,
            }),
            Err(StoreError::AlreadyExists {
                kind: RowKind::IdempotencyKey,
                ..
            }) => {
                tracing::debug!(token = %token, "Lost idempotency race, returning winner");
                self.lookup(&token).await?.ok_or_else(|| {
                    PaymentError::Infrastructure(StoreError::NotFound {
                        kind: RowKind::IdempotencyKey,
                        key: token,
                    })
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn lookup(&self, token: &str) -> Result<Option<Resolution>, PaymentError> {
        let key: IdempotencyKey = match self.store.get(token).await {
            Ok(key) => key,
            Err(StoreError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // A missing transaction here is a broken binding, not a client error.
        let transaction: Transaction = self.store.get(&key.transaction_id).await?;
        Ok(Some(Resolution {
            transaction,
            token: key.id,
            is_new: false,
        }))
    }
}
