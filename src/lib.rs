//! minipay: a minimal payment service
//!
//! A library for recording idempotent charges and refunds, and for
//! notifying an external receiver of each successful charge through a
//! durable, retrying webhook outbox.

pub mod config;
pub mod metrics;
pub mod payment;
pub mod server;
pub mod store;
pub mod time;
pub mod webhook;
