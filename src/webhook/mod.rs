//! Webhook outbox and delivery.
//!
//! This module provides types and traits for:
//! - Queued notifications ([`WebhookEvent`]) and their owner ([`Outbox`])
//! - The retry schedule ([`BackoffPolicy`])
//! - Single delivery attempts ([`Deliverer`]) and the polling loop ([`DeliveryWorker`])
//! - Abstracting HTTP clients ([`HttpClient`]) with a reqwest implementation ([`ReqwestClient`])

mod backoff;
mod client;
mod error;
mod event;
mod http;
mod outbox;
mod worker;


pub use backoff::BackoffPolicy;
pub use client::ReqwestClient;
pub use error::{DeliveryError, HttpError, IsRetryable};
pub use event::{EventStatus, PAYMENT_SUCCEEDED, WebhookEvent};
pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use outbox::Outbox;
pub use worker::{Deliverer, DeliveryWorker, WorkerOptions};

#[cfg(test)]
pub use http::mock;
