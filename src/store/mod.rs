//! Row storage for transactions, idempotency keys, and webhook events.
//!
//! This module provides:
//! - The [`Row`] trait implemented by every persisted record
//! - The [`Store`] trait (create / get / update / query, plus atomic batches)
//! - [`WriteBatch`] for all-or-nothing multi-row writes
//! - An in-memory implementation ([`MemoryStore`])
//! - A JSON-file implementation with atomic writes ([`FileStore`])
//!
//! # Concurrency Contract
//!
//! Every store implementation guarantees, per row:
//! - `create` is insert-if-absent: a second create of the same key fails
//!   with [`StoreError::AlreadyExists`] and writes nothing.
//! - `update` is optimistic: it succeeds only when the row's version matches
//!   the stored version, otherwise [`StoreError::Conflict`].
//!
//! [`Store::apply`] extends both rules to a group of rows. If any operation
//! in the batch would fail, no operation in it is applied.

mod batch;
mod error;
mod file;
mod memory;


pub use batch::WriteBatch;
pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The kinds of rows the service persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    /// A monetary charge record.
    Transaction,
    /// A client token bound to the transaction it produced.
    IdempotencyKey,
    /// A queued outbound notification.
    WebhookEvent,
}

impl RowKind {
    /// All row kinds, in table order.
    pub const ALL: [Self; 3] = [Self::Transaction, Self::IdempotencyKey, Self::WebhookEvent];

    /// Returns the table name for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transaction => "transaction",
            Self::IdempotencyKey => "idempotency_key",
            Self::WebhookEvent => "webhook_event",
        }
    }
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that can be persisted in a [`Store`].
///
/// The version is owned by the store: it is `0` for a row that has never
/// been written, `1` after creation, and increases by one on every update.
/// Implementations should exclude it from their serialized form.
pub trait Row: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The table this row lives in.
    const KIND: RowKind;

    /// The primary key of this row.
    fn key(&self) -> String;

    /// The version this row was read at.
    fn version(&self) -> u64;

    /// Sets the version (called by the store after reads and writes).
    fn set_version(&mut self, version: u64);
}

/// Abstraction over durable row storage.
///
/// Implementations must be usable from many tasks at once; each method is a
/// single atomic step with respect to other calls.
///
/// # Testing
///
/// [`MemoryStore`] is a complete implementation and is what tests use.
pub trait Store: Send + Sync {
    /// Applies every operation in `batch`, or none of them.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AlreadyExists`] if a staged create collides with an existing key
    /// - [`StoreError::Conflict`] if a staged update was based on a stale version
    /// - [`StoreError::Write`] if a durable store cannot persist the result
    fn apply(
        &self,
        batch: WriteBatch,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Reads one row by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no row has the given key.
    fn get<R: Row>(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<R, StoreError>> + Send;

    /// Returns every row of kind `R` matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Deserialize`] if a stored row cannot be decoded.
    fn query<R, P>(
        &self,
        predicate: P,
    ) -> impl std::future::Future<Output = Result<Vec<R>, StoreError>> + Send
    where
        R: Row,
        P: Fn(&R) -> bool + Send;

    /// Allocates the next surrogate key for `kind`.
    ///
    /// Keys are strictly increasing. An allocated key that is never written
    /// leaves a gap; it is never handed out again within the same process.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the store's lock was poisoned.
    fn next_id(&self, kind: RowKind) -> Result<u64, StoreError>;

    /// Inserts a new row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the key is taken.
    fn create<R: Row>(
        &self,
        mut row: R,
    ) -> impl std::future::Future<Output = Result<R, StoreError>> + Send {
        async move {
            let mut batch = WriteBatch::new();
            batch.create(&mut row)?;
            self.apply(batch).await?;
            Ok(row)
        }
    }

    /// Writes a modified row back, provided nobody else wrote it first.
    ///
    /// On success the returned row carries its new version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the stored version moved on, or
    /// [`StoreError::NotFound`] if the row does not exist.
    fn update<R: Row>(
        &self,
        mut row: R,
    ) -> impl std::future::Future<Output = Result<R, StoreError>> + Send {
        async move {
            let mut batch = WriteBatch::new();
            batch.update(&mut row)?;
            self.apply(batch).await?;
            Ok(row)
        }
    }
}

impl<T: Store> Store for std::sync::Arc<T> {
    async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        (**self).apply(batch).await
    }

    async fn get<R: Row>(&self, key: &str) -> Result<R, StoreError> {
        (**self).get(key).await
    }

    async fn query<R, P>(&self, predicate: P) -> Result<Vec<R>, StoreError>
    where
        R: Row,
        P: Fn(&R) -> bool + Send,
    {
        (**self).query(predicate).await
    }

    fn next_id(&self, kind: RowKind) -> Result<u64, StoreError> {
        (**self).next_id(kind)
    }
}
