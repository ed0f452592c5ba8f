//! Read-only view of what is deployed.

use pplink_config::{keys, DeploymentSettings};
use serde::Serialize;
use tracing::debug;

use crate::error::{PlatformError, PlatformResult};
use crate::models::{EnterprisePolicy, Environment, LinkedPolicy};
use crate::platform::Platform;

/// What could be observed. `None` means absent or not configured.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkStatus {
    pub environment: Option<Environment>,
    pub linked_policy: Option<LinkedPolicy>,
    pub policy: Option<EnterprisePolicy>,
    pub resource_group_exists: Option<bool>,
}

impl NetworkStatus {
    /// Whether the environment is linked to the configured policy.
    pub fn is_linked(&self) -> bool {
        match (&self.linked_policy, &self.policy) {
            (Some(linked), Some(policy)) => linked.refers_to(policy),
            _ => false,
        }
    }
}

/// Absent or unconfigured becomes `None`; anything else is an error.
fn optional<T>(result: PlatformResult<T>) -> PlatformResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(PlatformError::Config(e)) => {
            debug!("Skipping status item: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Gather the current state of the configured environment, policy and resource group.
pub async fn inspect(platform: &Platform, settings: &DeploymentSettings) -> PlatformResult<NetworkStatus> {
    let mut status = NetworkStatus::default();

    if let Some(env) = optional(platform.resolve_environment(settings).await)? {
        status.environment = optional(platform.admin.get_environment(&env.id).await.map_err(Into::into))?;
        status.linked_policy = status.environment.as_ref().and_then(Environment::network_policy);
    }

    status.policy = optional(platform.resolve_policy(settings).await)?;

    if let (Some(subscription_id), Some(resource_group)) = (
        settings.get(keys::SUBSCRIPTION_ID),
        settings.get(keys::RESOURCE_GROUP),
    ) {
        status.resource_group_exists = Some(
            platform
                .arm
                .resource_group_exists(subscription_id, resource_group)
                .await?,
        );
    }

    Ok(status)
}
