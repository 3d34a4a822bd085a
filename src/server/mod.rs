//! HTTP API.
//!
//! Endpoints:
//! - `POST /api/v1/charges`  - create a charge (optional `Idempotency-Key` header)
//! - `POST /api/v1/refunds`  - refund a transaction in full
//! - `GET  /api/v1/balance`  - net balance of the ledger
//! - `GET  /metrics`         - counter snapshot
//! - `GET  /health`          - liveness
//!
//! Every response body is JSON; errors are `{"error": "<message>"}`.

mod error;
mod handlers;


use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::payment::PaymentService;
use crate::store::Store;
use crate::time::Clock;

pub use error::ApiError;
pub use handlers::{
    BalanceResponse, ChargeRequest, ChargeResponse, IDEMPOTENCY_KEY, RefundRequest,
    RefundResponse,
};

/// Builds the application router around a shared [`PaymentService`].
pub fn router<S, C>(service: Arc<PaymentService<S, C>>) -> Router
where
    S: Store + 'static,
    C: Clock + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics::<S, C>))
        .route("/api/v1/charges", post(handlers::create_charge::<S, C>))
        .route("/api/v1/refunds", post(handlers::refund::<S, C>))
        .route("/api/v1/balance", get(handlers::balance::<S, C>))
        .fallback(handlers::not_found)
        .layer(cors)
        .with_state(service)
}
