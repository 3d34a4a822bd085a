//! Charges, refunds and idempotency.
//!
//! This module provides:
//! - The persisted rows ([`Transaction`], [`IdempotencyKey`])
//! - The ledger of transactions ([`Ledger`])
//! - Token-based deduplication of charge requests ([`IdempotencyResolver`])
//! - The facade used by the HTTP layer ([`PaymentService`])

mod error;
mod idempotency;
mod ledger;
mod model;
mod service;

#[cfg(test)]
mod ledger_tests;

pub use error::PaymentError;
pub use idempotency::{IdempotencyResolver, Resolution};
pub use ledger::Ledger;
pub use model::{
    Balance, ChargeSpec, IdempotencyKey, MAX_CURRENCY_LEN, MAX_CUSTOMER_LEN, PaymentNotification,
    Transaction, TransactionStatus,
};
pub use service::PaymentService;
