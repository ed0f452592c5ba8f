//! Link an environment to its network injection policy.

use pplink_config::{keys, SettingsStore};
use pplink_core::Completion;
use tracing::{info, warn};

use crate::error::{PlatformError, PlatformResult};
use crate::platform::Platform;

/// How the link ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// The link request ran to completion.
    Linked(Completion),
    /// The environment already pointed at this policy; nothing was sent.
    AlreadyLinked,
}

/// Summary of a link run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReport {
    pub environment_id: String,
    pub environment_label: String,
    pub policy_id: String,
    pub state: LinkState,
}

/// Resolve the environment and policy, record their ids, then link.
///
/// Identifiers are checkpointed to the configuration file as soon as they are
/// known, so a failed link can be retried or torn down without resolving again.
pub async fn link(platform: &Platform, store: &mut SettingsStore) -> PlatformResult<LinkReport> {
    let environment = platform.resolve_environment(store.settings()).await?;
    store.checkpoint(keys::ENVIRONMENT_ID, &environment.id)?;

    let policy = platform.resolve_policy(store.settings()).await?;
    store.checkpoint(keys::POLICY_ID, &policy.id)?;

    let system_id = Platform::system_id(&policy)?;

    let current = platform.admin.get_environment(&environment.id).await?;
    if let Some(linked) = current.network_policy() {
        if linked.refers_to(&policy) {
            info!("Environment {} is already linked to {}", environment.label, policy.name);
            return Ok(LinkReport {
                environment_id: environment.id,
                environment_label: environment.label,
                policy_id: policy.id,
                state: LinkState::AlreadyLinked,
            });
        }
        let other = linked.id.or(linked.system_id).unwrap_or_default();
        warn!("Environment {} is linked to {}", environment.label, other);
        return Err(PlatformError::LinkedElsewhere {
            environment: environment.label,
            linked: other,
        });
    }

    let completion = platform
        .admin
        .link_policy(&environment.id, &system_id, &platform.poll)
        .await?
        .into_result(&format!("link {} to {}", environment.label, policy.name))?;

    info!("Linked environment {} to {}", environment.label, policy.name);
    Ok(LinkReport {
        environment_id: environment.id,
        environment_label: environment.label,
        policy_id: policy.id,
        state: LinkState::Linked(completion),
    })
}
