//! Error types for webhook delivery.

use thiserror::Error;

/// Error type for HTTP transport operations.
///
/// Describes what went wrong on the wire without dictating recovery.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network connection failed (DNS, refused, reset, TLS).
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The endpoint did not answer within the request timeout.
    #[error("Request timed out")]
    Timeout,

    /// The request could not be built (bad URL or header).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Outcome of a single failed delivery attempt.
///
/// Whether the event is rescheduled or marked failed is decided by
/// [`IsRetryable`].
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The request never produced a response.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The endpoint answered with a client error (4xx).
    #[error("Endpoint rejected webhook with status {status}")]
    Rejected {
        /// The 4xx status returned.
        status: http::StatusCode,
        /// Response body, if valid UTF-8.
        body: Option<String>,
    },

    /// The endpoint answered with any other non-2xx status.
    #[error("Endpoint returned status {status}")]
    NonSuccessStatus {
        /// The status returned.
        status: http::StatusCode,
        /// Response body, if valid UTF-8.
        body: Option<String>,
    },

    /// The stored payload is not valid JSON.
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    /// The event type cannot be sent as a header value.
    #[error("Invalid header value for event type '{0}'")]
    InvalidHeader(String),

    /// The stored target URL does not parse.
    #[error("Invalid target URL '{url}': {reason}")]
    InvalidTarget {
        /// The stored URL text.
        url: String,
        /// Why it failed to parse.
        reason: String,
    },
}

/// Extension trait for checking if an error is retryable.
///
/// A retryable error sends the event back to `pending` with a backoff;
/// anything else is terminal.
pub trait IsRetryable {
    /// Returns true if the error is potentially transient and should be retried.
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout | Self::InvalidRequest(_) => true,
        }
    }
}

impl IsRetryable for DeliveryError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_retryable(),
            Self::NonSuccessStatus { .. } | Self::InvalidTarget { .. } => true,
            Self::Rejected { .. } | Self::MalformedPayload(_) | Self::InvalidHeader(_) => false,
        }
    }
}
