//! Error types for payment operations.

use std::borrow::Cow;

use thiserror::Error;

use crate::store::StoreError;

use super::TransactionStatus;

/// Errors returned by the ledger, the idempotency resolver and the service.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// A request field is out of bounds.
    #[error("Invalid {field}: {reason}")]
    Validation {
        field: &'static str,
        reason: Cow<'static, str>,
    },

    /// No transaction has the given id.
    #[error("Transaction '{id}' not found")]
    NotFound { id: String },

    /// The transaction is not in a state that allows the operation.
    #[error("Transaction '{id}' cannot be refunded in status {status}")]
    InvalidState {
        id: String,
        status: TransactionStatus,
    },

    /// The transaction has already been refunded.
    #[error("Transaction '{id}' is already refunded")]
    AlreadyRefunded { id: String },

    /// The ledger total does not fit in an `i64`.
    #[error("Balance overflows the ledger total")]
    BalanceOverflow,

    /// Storage failed underneath the operation.
    #[error("Storage error: {0}")]
    Infrastructure(#[from] StoreError),
}

impl PaymentError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}
