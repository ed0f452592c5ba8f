//! Mock HTTP transport for testing.
//!
//! Provides a scripted implementation of the `HttpTransport` trait so the
//! poller, locator and clients can be exercised without network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, Method};

/// Captured request information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: Method,
    pub url: String,
    pub authorization: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// Mock transport.
///
/// Responses are returned in the order they were added. Once the script is
/// exhausted the last response is repeated, which makes "never finishes"
/// scenarios easy to express.
#[derive(Clone)]
pub struct MockTransport {
    /// Scripted responses.
    responses: Arc<RwLock<Vec<HttpResponse>>>,
    /// Index of the next response to return.
    response_index: Arc<AtomicUsize>,
    /// Captured calls for verification.
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    /// Simulated transport failure.
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(Vec::new())),
            response_index: Arc::new(AtomicUsize::new(0)),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            simulate_failure: Arc::new(RwLock::new(None)),
        }
    }

    /// Add a response for the next call.
    pub fn add_response(self, response: HttpResponse) -> Self {
        self.responses.write().push(response);
        self
    }

    /// Replace the script.
    pub fn with_responses(self, responses: Vec<HttpResponse>) -> Self {
        *self.responses.write() = responses;
        self
    }

    /// Fail every call with a transport error.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    /// All captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Calls made with a given method.
    pub fn get_method_calls(&self, method: Method) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Clear captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    fn next_response(&self) -> HttpResponse {
        let responses = self.responses.read();
        if responses.is_empty() {
            return HttpResponse::new(200);
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses
            .get(index)
            .or_else(|| responses.last())
            .cloned()
            .unwrap_or_else(|| HttpResponse::new(200))
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> CoreResult<HttpResponse> {
        self.captured_calls.write().push(CapturedCall {
            method: request.method,
            url: request.url.clone(),
            authorization: request.header_value("Authorization").map(str::to_string),
            body: request.body.clone(),
        });

        if let Some(msg) = self.simulate_failure.read().clone() {
            return Err(CoreError::Transport(msg));
        }

        Ok(self.next_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_order_and_repeat_last() {
        let mock = MockTransport::new()
            .add_response(HttpResponse::new(202))
            .add_response(HttpResponse::new(200));

        let request = HttpRequest::get("https://example.test/op");
        assert_eq!(mock.send(&request).await.unwrap().status, 202);
        assert_eq!(mock.send(&request).await.unwrap().status, 200);
        assert_eq!(mock.send(&request).await.unwrap().status, 200);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_captures_authorization() {
        let mock = MockTransport::new();
        let request = HttpRequest::delete("https://example.test/r").bearer("tok");
        mock.send(&request).await.unwrap();

        let calls = mock.get_method_calls(Method::Delete);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].authorization.as_deref(), Some("Bearer tok"));
    }

    #[tokio::test]
    async fn test_simulated_failure() {
        let mock = MockTransport::new().simulate_failure("connection reset");
        let result = mock.send(&HttpRequest::get("https://example.test")).await;
        assert!(matches!(result, Err(CoreError::Transport(_))));
        assert_eq!(mock.call_count(), 1);
    }
}
