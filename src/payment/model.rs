//! Payment row types and request shapes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Row, RowKind};

use super::PaymentError;

/// Longest accepted currency code.
pub const MAX_CURRENCY_LEN: usize = 8;

/// Longest accepted customer reference.
pub const MAX_CUSTOMER_LEN: usize = 64;

/// Lifecycle of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Succeeded,
    Refunded,
}

impl TransactionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger entry for one charge.
///
/// `refunded` is true exactly when `status` is [`TransactionStatus::Refunded`],
/// and once set it never goes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub customer: String,
    pub status: TransactionStatus,
    pub refunded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: u64,
}

impl Row for Transaction {
    const KIND: RowKind = RowKind::Transaction;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Binds a client-supplied token to the transaction it first produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyKey {
    /// The token itself.
    pub id: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: u64,
}

impl Row for IdempotencyKey {
    const KIND: RowKind = RowKind::IdempotencyKey;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// The fields a caller supplies to create a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeSpec {
    pub amount: i64,
    pub currency: String,
    pub customer: String,
}

impl ChargeSpec {
    /// Creates a charge request.
    pub fn new(amount: i64, currency: impl Into<String>, customer: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
            customer: customer.into(),
        }
    }

    /// Checks the request against the ledger's column limits.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.amount <= 0 {
            return Err(PaymentError::validation("amount", "must be positive"));
        }
        check_text("currency", &self.currency, MAX_CURRENCY_LEN)?;
        check_text("customer", &self.customer, MAX_CUSTOMER_LEN)
    }
}

fn check_text(field: &'static str, value: &str, max_len: usize) -> Result<(), PaymentError> {
    if value.trim().is_empty() {
        return Err(PaymentError::validation(field, "must not be empty"));
    }
    if value.chars().count() > max_len {
        return Err(PaymentError::validation(
            field,
            format!("must be at most {max_len} characters"),
        ));
    }
    Ok(())
}

/// Totals over the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub successful_count: u64,
    pub refunded_count: u64,
    /// Succeeded amounts minus refunded amounts, in minor units.
    pub balance: i64,
}

/// Body of a `payment.succeeded` webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub customer: String,
    pub status: TransactionStatus,
}

impl From<&Transaction> for PaymentNotification {
    fn from(txn: &Transaction) -> Self {
        Self {
            id: txn.id.clone(),
            amount: txn.amount,
            currency: txn.currency.clone(),
            customer: txn.customer.clone(),
            status: txn.status,
        }
    }
}
