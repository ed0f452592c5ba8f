//! The clients one invocation works with, plus setting-driven resolution.

use std::sync::Arc;

use pplink_config::{keys, DeploymentSettings};
use pplink_core::{ApiClient, PollSettings};
use tracing::{debug, info};

use crate::admin::AdminClient;
use crate::arm::ArmClient;
use crate::endpoints::Endpoints;
use crate::error::{PlatformError, PlatformResult};
use crate::locator::{ResourceKind, ResourceLocator};
use crate::models::EnterprisePolicy;

/// Environment as identified for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    pub id: String,
    /// Display name when known, otherwise the id.
    pub label: String,
}

/// Everything needed to talk to both control planes.
#[derive(Debug)]
pub struct Platform {
    pub arm: ArmClient,
    pub admin: AdminClient,
    pub locator: ResourceLocator,
    pub poll: PollSettings,
}

impl Platform {
    pub fn new(client: ApiClient, endpoints: Endpoints, poll: PollSettings) -> Self {
        let endpoints = Arc::new(endpoints);
        Self {
            arm: ArmClient::new(client.clone(), endpoints.clone()),
            admin: AdminClient::new(client.clone(), endpoints.clone()),
            locator: ResourceLocator::new(client, endpoints),
            poll,
        }
    }

    /// Environment from its configured id, or by display name.
    pub async fn resolve_environment(&self, settings: &DeploymentSettings) -> PlatformResult<ResolvedEnvironment> {
        if let Some(id) = &settings.environment_id {
            debug!("Using configured environment id {}", id);
            return Ok(ResolvedEnvironment {
                id: id.clone(),
                label: settings.environment_name.clone().unwrap_or_else(|| id.clone()),
            });
        }

        settings.require(&[keys::ENVIRONMENT_NAME])?;
        let name = settings.value(keys::ENVIRONMENT_NAME)?;
        let resource = self
            .locator
            .find_by_display_name(&ResourceKind::Environment, name)
            .await?;
        info!("Resolved environment '{}' to {}", name, resource.name);
        Ok(ResolvedEnvironment {
            id: resource.name,
            label: name.to_string(),
        })
    }

    /// Enterprise policy from its configured resource id, or by name.
    pub async fn resolve_policy(&self, settings: &DeploymentSettings) -> PlatformResult<EnterprisePolicy> {
        if let Some(id) = &settings.policy_id {
            debug!("Using configured enterprise policy {}", id);
            return Ok(self.arm.get_enterprise_policy_by_id(id).await?);
        }

        settings.require(&[keys::SUBSCRIPTION_ID, keys::RESOURCE_GROUP, keys::POLICY_NAME])?;
        let kind = ResourceKind::EnterprisePolicy {
            subscription_id: settings.value(keys::SUBSCRIPTION_ID)?.to_string(),
            resource_group: settings.value(keys::RESOURCE_GROUP)?.to_string(),
        };
        let name = settings.value(keys::POLICY_NAME)?;
        let resource = self.locator.find_by_display_name(&kind, name).await?;
        info!("Resolved enterprise policy '{}' to {}", name, resource.id);

        Ok(EnterprisePolicy {
            id: resource.id,
            name: resource.name,
            location: None,
            kind: None,
            properties: resource.properties,
        })
    }

    /// System id of `policy`, which link and unlink require.
    pub fn system_id(policy: &EnterprisePolicy) -> PlatformResult<String> {
        policy
            .system_id()
            .map(str::to_string)
            .ok_or_else(|| PlatformError::InvalidResponse {
                resource: policy.id.clone(),
                reason: "enterprise policy has no properties.systemId".to_string(),
            })
    }
}
