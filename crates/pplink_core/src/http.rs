//! HTTP request/response descriptors and the transport seam.
//!
//! Everything above this module speaks in `HttpRequest` / `HttpResponse`
//! values, so the LRO poller and the platform clients can run against the
//! real `ReqwestTransport` or a scripted `MockTransport`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing request.
#[derive(Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Attach a bearer token.
    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Header value by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(n, v)| {
                if n.eq_ignore_ascii_case("authorization") {
                    (n.as_str(), "<redacted>")
                } else {
                    (n.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body", &self.body)
            .finish()
    }
}

/// A received response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are stored lowercase.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json(self, body: serde_json::Value) -> Self {
        self.with_body(body.to_string())
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> CoreResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Turn a non-success response into the matching `CoreError`.
    pub fn error_for_status(self, target: &str) -> CoreResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CoreError::from_status(self.status, target, self.body))
        }
    }
}

/// Something that can execute HTTP requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and return the response, whatever its status.
    ///
    /// Only transport-level problems (DNS, TLS, timeouts) are errors.
    async fn send(&self, request: &HttpRequest) -> CoreResult<HttpResponse>;
}

/// `HttpTransport` backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a transport with the default timeout.
    pub fn new() -> CoreResult<Self> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    /// Create a transport with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pplink/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> CoreResult<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            Some(body) => builder.json(body),
            None if request.method != Method::Get => builder.header("Content-Length", "0"),
            None => builder,
        };

        debug!("{} {}", request.method, request.url);
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Transport(format!("reading response body from {}: {}", request.url, e)))?;

        debug!("{} {} -> {}", request.method, request.url, status);
        Ok(HttpResponse { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_replaces_existing() {
        let request = HttpRequest::get("https://example.test")
            .bearer("one")
            .bearer("two");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header_value("authorization"), Some("Bearer two"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let request = HttpRequest::get("https://example.test").bearer("secret-token");
        let rendered = format!("{:?}", request);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_response_header_case_insensitive() {
        let response = HttpResponse::new(202).with_header("Location", "https://poll");
        assert_eq!(response.header("location"), Some("https://poll"));
        assert_eq!(response.header("LOCATION"), Some("https://poll"));
    }

    #[test]
    fn test_error_for_status() {
        let ok = HttpResponse::new(200).error_for_status("thing");
        assert!(ok.is_ok());

        let err = HttpResponse::new(403)
            .with_body("nope")
            .error_for_status("thing")
            .unwrap_err();
        assert!(matches!(err, CoreError::Permission(_)));
    }
}
