//! Route handlers and their request/response bodies.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::metrics::MetricsSnapshot;
use crate::payment::{Balance, ChargeSpec, PaymentService, Transaction, TransactionStatus};
use crate::store::Store;
use crate::time::Clock;

use super::ApiError;

/// Header carrying the client's idempotency token.
pub const IDEMPOTENCY_KEY: &str = "idempotency-key";

type Service<S, C> = State<Arc<PaymentService<S, C>>>;

#[derive(Debug, Clone, Deserialize)]
pub struct ChargeRequest {
    pub amount: i64,
    pub currency: String,
    pub customer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChargeResponse {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub customer: String,
    pub status: TransactionStatus,
    pub idempotency_key: String,
    /// RFC 3339, second precision.
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundRequest {
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefundResponse {
    pub id: String,
    pub amount: i64,
    pub status: TransactionStatus,
    pub refunded_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceResponse {
    pub successful_transactions: u64,
    pub refunded_transactions: u64,
    pub balance: i64,
}

impl From<Balance> for BalanceResponse {
    fn from(balance: Balance) -> Self {
        Self {
            successful_transactions: balance.successful_count,
            refunded_transactions: balance.refunded_count,
            balance: balance.balance,
        }
    }
}

impl RefundResponse {
    fn from_transaction(transaction: &Transaction) -> Self {
        Self {
            id: transaction.id.clone(),
            amount: transaction.amount,
            status: transaction.status,
            refunded_at: rfc3339(transaction.updated_at),
        }
    }
}

fn rfc3339(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/v1/charges
///
/// Answers 201 for a new charge and 200 when the idempotency token was
/// already bound.
pub async fn create_charge<S: Store + 'static, C: Clock + 'static>(
    State(service): Service<S, C>,
    headers: HeaderMap,
    body: Result<Json<ChargeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChargeResponse>), ApiError> {
    let Json(request) = body?;
    let token = idempotency_token(&headers)?;
    let spec = ChargeSpec::new(request.amount, request.currency, request.customer);

    let resolution = service.create_charge(token, &spec).await?;

    let status = if resolution.is_new {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let transaction = resolution.transaction;
    Ok((
        status,
        Json(ChargeResponse {
            created_at: rfc3339(transaction.created_at),
            id: transaction.id,
            amount: transaction.amount,
            currency: transaction.currency,
            customer: transaction.customer,
            status: transaction.status,
            idempotency_key: resolution.token,
        }),
    ))
}

/// Reads the idempotency token, rejecting a header that is not visible ASCII.
fn idempotency_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    headers
        .get(IDEMPOTENCY_KEY)
        .map(|value| {
            value.to_str().map_err(|_| {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "Invalid Idempotency-Key header: must be visible ASCII",
                )
            })
        })
        .transpose()
}

/// POST /api/v1/refunds
pub async fn refund<S: Store + 'static, C: Clock + 'static>(
    State(service): Service<S, C>,
    body: Result<Json<RefundRequest>, JsonRejection>,
) -> Result<Json<RefundResponse>, ApiError> {
    let Json(request) = body?;
    let transaction = service.refund(&request.transaction_id).await?;
    Ok(Json(RefundResponse::from_transaction(&transaction)))
}

/// GET /api/v1/balance
pub async fn balance<S: Store + 'static, C: Clock + 'static>(
    State(service): Service<S, C>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = service.balance().await?;
    Ok(Json(balance.into()))
}

/// GET /metrics
pub async fn metrics<S: Store + 'static, C: Clock + 'static>(
    State(service): Service<S, C>,
) -> Json<MetricsSnapshot> {
    Json(service.metrics_snapshot())
}

/// Fallback for unmatched routes.
pub async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "not found")
}
