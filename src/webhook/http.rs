//! HTTP request/response types and client trait.

use super::HttpError;

/// An outbound HTTP request.
///
/// Uses the `http` crate's method and header types so any [`HttpClient`]
/// implementation can consume it.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: http::Method,
    pub url: url::Url,
    pub headers: http::HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request with no headers and no body.
    #[must_use]
    pub fn new(method: http::Method, url: url::Url) -> Self {
        Self {
            method,
            url,
            headers: http::HeaderMap::new(),
            body: None,
        }
    }

    /// Creates a POST request to the given URL.
    #[must_use]
    pub fn post(url: url::Url) -> Self {
        Self::new(http::Method::POST, url)
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a header, appending if the name is already present.
    #[must_use]
    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: http::StatusCode,
    pub headers: http::HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a new HTTP response.
    #[must_use]
    pub const fn new(status: http::StatusCode, headers: http::HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Creates a response with the given status and an empty body.
    #[must_use]
    pub fn with_status(status: http::StatusCode) -> Self {
        Self::new(status, http::HeaderMap::new(), Vec::new())
    }

    /// Returns the body as a UTF-8 string, if valid.
    #[must_use]
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Trait for making HTTP requests.
///
/// The delivery worker only talks to this trait, so tests can swap in
/// [`mock::MockClient`] and production uses [`ReqwestClient`].
///
/// [`ReqwestClient`]: super::ReqwestClient
pub trait HttpClient: Send + Sync {
    /// Sends an HTTP request and returns the response.
    ///
    /// Any status code, including 4xx and 5xx, is a successful response
    /// at this layer.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] when:
    /// - Network connection fails ([`HttpError::Connection`])
    /// - Request times out ([`HttpError::Timeout`])
    /// - The request cannot be built ([`HttpError::InvalidRequest`])
    fn request(
        &self,
        req: HttpRequest,
    ) -> impl std::future::Future<Output = Result<HttpResponse, HttpError>> + Send;
}

impl<T: HttpClient> HttpClient for std::sync::Arc<T> {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        (**self).request(req).await
    }
}

/// Scripted HTTP client for tests.
#[cfg(test)]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::{HttpClient, HttpError, HttpRequest, HttpResponse};

    /// Replays queued outcomes in order and records every request.
    ///
    /// Once the script runs out, every further call answers 200.
    #[derive(Debug, Default)]
    pub struct MockClient {
        script: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl MockClient {
        /// Creates a client that answers 200 to everything.
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a client that answers with the given statuses in order.
        pub fn statuses(statuses: &[u16]) -> Self {
            let client = Self::new();
            for &status in statuses {
                client.push_status(status);
            }
            client
        }

        pub fn push_status(&self, status: u16) {
            let status = http::StatusCode::from_u16(status).unwrap();
            self.push(Ok(HttpResponse::with_status(status)));
        }

        pub fn push(&self, outcome: Result<HttpResponse, HttpError>) {
            self.script.lock().unwrap().push_back(outcome);
        }

        /// Returns every request sent so far.
        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl HttpClient for MockClient {
        async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
            self.requests.lock().unwrap().push(req);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(HttpResponse::with_status(http::StatusCode::OK)))
        }
    }
}
