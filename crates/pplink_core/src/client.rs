//! Authenticated request helper shared by the poller and the platform clients.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::credential::{Audience, CredentialProvider};
use crate::error::{CoreError, CoreResult};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};

/// A transport paired with a credential provider.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<CredentialProvider>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, credentials: Arc<CredentialProvider>) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialProvider> {
        &self.credentials
    }

    /// Send `request` with a bearer token for `audience`.
    ///
    /// Credential failures are returned as errors; the response is returned
    /// whatever its status.
    pub async fn send(&self, audience: Audience, request: HttpRequest) -> CoreResult<HttpResponse> {
        let token = self.credentials.token(audience).await?;
        let request = request.bearer(token.secret());
        let response = self.transport.send(&request).await?;

        if response.status == 401 {
            warn!("{} {} was rejected with 401, dropping cached {} token", request.method, request.url, audience);
            self.credentials.invalidate(audience);
        }
        Ok(response)
    }

    /// GET `url` and deserialize a successful JSON response.
    pub async fn get_json<T: DeserializeOwned>(&self, audience: Audience, url: &str) -> CoreResult<T> {
        let response = self
            .send(audience, HttpRequest::get(url))
            .await?
            .error_for_status(url)?;
        debug!("GET {} -> {} bytes", url, response.body.len());
        response.json().map_err(|e| match e {
            CoreError::Json(inner) => CoreError::Api {
                status: response.status,
                body: format!("unparseable response from {}: {}", url, inner),
            },
            other => other,
        })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("credentials", &self.credentials)
            .finish()
    }
}
