//! Power Platform admin API operations.

use std::sync::Arc;

use pplink_core::{
    ApiClient, Audience, CoreResult, LroOutcome, LroPoller, LroRequest, Method, PollSettings,
};
use serde_json::json;
use tracing::info;

use crate::endpoints::Endpoints;
use crate::models::Environment;
use crate::paging;

/// Link or unlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    Link,
    Unlink,
}

impl LinkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkAction::Link => "link",
            LinkAction::Unlink => "unlink",
        }
    }
}

/// Client for environments and their network injection policy.
#[derive(Debug, Clone)]
pub struct AdminClient {
    client: ApiClient,
    poller: LroPoller,
    endpoints: Arc<Endpoints>,
}

impl AdminClient {
    const AUDIENCE: Audience = Audience::PowerPlatformAdmin;

    pub fn new(client: ApiClient, endpoints: Arc<Endpoints>) -> Self {
        Self {
            poller: LroPoller::new(client.clone()),
            client,
            endpoints,
        }
    }

    pub async fn list_environments(&self) -> CoreResult<Vec<Environment>> {
        paging::fetch_all(&self.client, Self::AUDIENCE, &self.endpoints.environments_url())
            .await?
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(Into::into))
            .collect()
    }

    pub async fn get_environment(&self, environment_id: &str) -> CoreResult<Environment> {
        self.client
            .get_json(Self::AUDIENCE, &self.endpoints.environment_url(environment_id))
            .await
    }

    pub async fn delete_environment(&self, environment_id: &str, settings: &PollSettings) -> CoreResult<LroOutcome> {
        info!("Deleting environment {}", environment_id);
        let request = LroRequest::new(
            format!("delete environment {}", environment_id),
            Method::Delete,
            self.endpoints.environment_url(environment_id),
            Self::AUDIENCE,
        );
        self.poller.submit_and_wait(&request, settings).await
    }

    /// Link or unlink the network injection policy identified by `system_id`.
    pub async fn network_injection(
        &self,
        action: LinkAction,
        environment_id: &str,
        system_id: &str,
        settings: &PollSettings,
    ) -> CoreResult<LroOutcome> {
        info!("Requesting {} of policy {} for environment {}", action.as_str(), system_id, environment_id);
        let request = LroRequest::new(
            format!("{} enterprise policy for environment {}", action.as_str(), environment_id),
            Method::Post,
            self.endpoints.network_injection_url(environment_id, action.as_str()),
            Self::AUDIENCE,
        )
        .with_body(json!({ "SystemId": system_id }));
        self.poller.submit_and_wait(&request, settings).await
    }

    pub async fn link_policy(&self, environment_id: &str, system_id: &str, settings: &PollSettings) -> CoreResult<LroOutcome> {
        self.network_injection(LinkAction::Link, environment_id, system_id, settings)
            .await
    }

    pub async fn unlink_policy(&self, environment_id: &str, system_id: &str, settings: &PollSettings) -> CoreResult<LroOutcome> {
        self.network_injection(LinkAction::Unlink, environment_id, system_id, settings)
            .await
    }
}
