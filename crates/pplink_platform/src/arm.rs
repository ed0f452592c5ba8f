//! Azure Resource Manager operations.

use std::sync::Arc;

use pplink_core::{
    ApiClient, Audience, CoreResult, HttpRequest, LroOutcome, LroPoller, LroRequest, Method,
    PollSettings, TerminalCheck,
};
use tracing::info;

use crate::endpoints::Endpoints;
use crate::models::EnterprisePolicy;
use crate::paging;

/// Client for the Resource Manager side: enterprise policies and resource groups.
#[derive(Debug, Clone)]
pub struct ArmClient {
    client: ApiClient,
    poller: LroPoller,
    endpoints: Arc<Endpoints>,
}

impl ArmClient {
    const AUDIENCE: Audience = Audience::ResourceManager;

    pub fn new(client: ApiClient, endpoints: Arc<Endpoints>) -> Self {
        Self {
            poller: LroPoller::new(client.clone()),
            client,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Enterprise policy by resource group and name.
    pub async fn get_enterprise_policy(
        &self,
        subscription_id: &str,
        resource_group: &str,
        name: &str,
    ) -> CoreResult<EnterprisePolicy> {
        let url = self
            .endpoints
            .enterprise_policy_url(subscription_id, resource_group, name);
        self.client.get_json(Self::AUDIENCE, &url).await
    }

    /// Enterprise policy by full resource id.
    pub async fn get_enterprise_policy_by_id(&self, resource_id: &str) -> CoreResult<EnterprisePolicy> {
        let url = self.endpoints.enterprise_policy_by_id_url(resource_id);
        self.client.get_json(Self::AUDIENCE, &url).await
    }

    /// Every enterprise policy in a resource group.
    pub async fn list_enterprise_policies(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> CoreResult<Vec<EnterprisePolicy>> {
        let url = self
            .endpoints
            .enterprise_policies_url(subscription_id, resource_group);
        paging::fetch_all(&self.client, Self::AUDIENCE, &url)
            .await?
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(Into::into))
            .collect()
    }

    pub async fn delete_enterprise_policy(
        &self,
        policy: &EnterprisePolicy,
        settings: &PollSettings,
    ) -> CoreResult<LroOutcome> {
        info!("Deleting enterprise policy {}", policy.name);
        let request = LroRequest::new(
            format!("delete enterprise policy {}", policy.name),
            Method::Delete,
            self.endpoints.enterprise_policy_by_id_url(&policy.id),
            Self::AUDIENCE,
        )
        .with_terminal_check(TerminalCheck::AsyncOperationBody);
        self.poller.submit_and_wait(&request, settings).await
    }

    /// Whether the resource group exists.
    pub async fn resource_group_exists(&self, subscription_id: &str, resource_group: &str) -> CoreResult<bool> {
        let url = self.endpoints.resource_group_url(subscription_id, resource_group);
        let response = self.client.send(Self::AUDIENCE, HttpRequest::get(&url)).await?;
        if response.status == 404 {
            return Ok(false);
        }
        response.error_for_status(&url)?;
        Ok(true)
    }

    /// Delete a resource group and everything in it.
    pub async fn delete_resource_group(
        &self,
        subscription_id: &str,
        resource_group: &str,
        settings: &PollSettings,
    ) -> CoreResult<LroOutcome> {
        info!("Deleting resource group {}", resource_group);
        let request = LroRequest::new(
            format!("delete resource group {}", resource_group),
            Method::Delete,
            self.endpoints.resource_group_url(subscription_id, resource_group),
            Self::AUDIENCE,
        )
        .with_terminal_check(TerminalCheck::AsyncOperationBody);
        self.poller.submit_and_wait(&request, settings).await
    }
}
