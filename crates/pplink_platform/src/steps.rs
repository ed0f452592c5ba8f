//! Cleanup steps.
//!
//! Every step treats "already gone" as success, so a cleanup can be re-run
//! after a partial failure and only the leftovers are touched.

use std::fmt::Display;

use async_trait::async_trait;
use pplink_config::{keys, SettingsStore, GENERATED_KEYS};
use pplink_core::{StepOutcome, TeardownStep};
use tracing::{debug, warn};

use crate::error::{PlatformError, PlatformResult};
use crate::locator::ResourceKind;
use crate::platform::Platform;

pub const UNLINK_POLICY: &str = "unlink-policy";
pub const DELETE_ENVIRONMENT: &str = "delete-environment";
pub const DELETE_POLICY: &str = "delete-enterprise-policy";
pub const DELETE_RESOURCE_GROUP: &str = "delete-resource-group";
pub const RESET_CONFIG: &str = "reset-config";

/// State shared by the cleanup steps.
#[derive(Debug)]
pub struct CleanupContext {
    pub platform: Platform,
    pub store: SettingsStore,
    /// Generated keys whose resources are confirmed gone.
    pub cleared: Vec<&'static str>,
}

impl CleanupContext {
    pub fn new(platform: Platform, store: SettingsStore) -> Self {
        Self {
            platform,
            store,
            cleared: Vec::new(),
        }
    }

    fn mark_cleared(&mut self, key: &'static str) {
        if !self.cleared.contains(&key) {
            self.cleared.push(key);
        }
    }

    fn environment_label(&self) -> String {
        let settings = self.store.settings();
        match (&settings.environment_name, &settings.environment_id) {
            (Some(name), Some(id)) => format!("environment {} ({})", name, id),
            (Some(name), None) => format!("environment {}", name),
            (None, Some(id)) => format!("environment {}", id),
            (None, None) => "environment (not configured)".to_string(),
        }
    }

    fn policy_label(&self) -> String {
        let settings = self.store.settings();
        match (&settings.policy_id, &settings.policy_name) {
            (Some(id), _) => format!("enterprise policy {}", id),
            (None, Some(name)) => format!("enterprise policy {}", name),
            (None, None) => "enterprise policy (not configured)".to_string(),
        }
    }

    fn resource_group_label(&self) -> String {
        let settings = self.store.settings();
        format!(
            "resource group {} in subscription {}",
            settings.resource_group.as_deref().unwrap_or("(not configured)"),
            settings.subscription_id.as_deref().unwrap_or("(not configured)")
        )
    }
}

/// Turn a resolution failure into the outcome the step should record.
fn settle<T>(result: PlatformResult<T>, what: &str) -> Result<T, StepOutcome> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_not_found() => Err(StepOutcome::success(format!("{} already absent", what))),
        Err(PlatformError::Config(e)) => Err(StepOutcome::skipped(e.to_string())),
        Err(e) => Err(failed(e)),
    }
}

fn failed(e: impl Display) -> StepOutcome {
    StepOutcome::failed(e.to_string())
}

/// Detach the network injection policy from the environment.
#[derive(Debug, Default)]
pub struct UnlinkPolicyStep;

#[async_trait]
impl TeardownStep<CleanupContext> for UnlinkPolicyStep {
    fn name(&self) -> &str {
        UNLINK_POLICY
    }

    fn description(&self) -> &str {
        "Unlink the enterprise policy from the Power Platform environment"
    }

    fn affected_resources(&self, ctx: &CleanupContext) -> Vec<String> {
        vec![ctx.environment_label(), ctx.policy_label()]
    }

    async fn execute(&self, ctx: &mut CleanupContext) -> StepOutcome {
        let platform = &ctx.platform;
        let settings = ctx.store.settings();

        let environment = match settle(platform.resolve_environment(settings).await, "environment") {
            Ok(environment) => environment,
            Err(outcome) => return outcome,
        };
        let current = match settle(
            platform.admin.get_environment(&environment.id).await.map_err(Into::into),
            "environment",
        ) {
            Ok(current) => current,
            Err(outcome) => return outcome,
        };
        let Some(linked) = current.network_policy() else {
            return StepOutcome::success("no network injection policy linked");
        };

        let system_id = match platform.resolve_policy(settings).await {
            Ok(policy) if !linked.refers_to(&policy) => {
                let other = linked.id.or(linked.system_id).unwrap_or_default();
                warn!("Environment {} is linked to {}, not {}", environment.label, other, policy.id);
                return failed(PlatformError::LinkedElsewhere {
                    environment: environment.label,
                    linked: other,
                });
            }
            Ok(policy) => match Platform::system_id(&policy) {
                Ok(system_id) => system_id,
                Err(e) => return failed(e),
            },
            Err(e) if e.is_not_found() || matches!(e, PlatformError::Config(_)) => {
                debug!("Configured policy unavailable ({}), using the linked one", e);
                match linked.system_id {
                    Some(system_id) => system_id,
                    None => return StepOutcome::failed("linked policy has no system id"),
                }
            }
            Err(e) => return failed(e),
        };

        match platform
            .admin
            .unlink_policy(&environment.id, &system_id, &platform.poll)
            .await
        {
            Ok(outcome) => outcome.into(),
            Err(e) => failed(e),
        }
    }
}

/// Delete the Power Platform environment.
#[derive(Debug, Default)]
pub struct DeleteEnvironmentStep;

#[async_trait]
impl TeardownStep<CleanupContext> for DeleteEnvironmentStep {
    fn name(&self) -> &str {
        DELETE_ENVIRONMENT
    }

    fn description(&self) -> &str {
        "Delete the Power Platform environment and all of its data"
    }

    fn affected_resources(&self, ctx: &CleanupContext) -> Vec<String> {
        vec![ctx.environment_label()]
    }

    async fn execute(&self, ctx: &mut CleanupContext) -> StepOutcome {
        let environment = match settle(
            ctx.platform.resolve_environment(ctx.store.settings()).await,
            "environment",
        ) {
            Ok(environment) => environment,
            Err(outcome) => {
                if outcome.is_success() {
                    ctx.mark_cleared(keys::ENVIRONMENT_ID);
                }
                return outcome;
            }
        };

        let outcome: StepOutcome = match ctx
            .platform
            .admin
            .delete_environment(&environment.id, &ctx.platform.poll)
            .await
        {
            Ok(outcome) => outcome.into(),
            Err(e) => return failed(e),
        };

        if outcome.is_success() {
            ctx.platform.locator.forget(&ResourceKind::Environment);
            ctx.mark_cleared(keys::ENVIRONMENT_ID);
        }
        outcome
    }
}

/// Delete the enterprise policy resource.
#[derive(Debug, Default)]
pub struct DeletePolicyStep;

#[async_trait]
impl TeardownStep<CleanupContext> for DeletePolicyStep {
    fn name(&self) -> &str {
        DELETE_POLICY
    }

    fn description(&self) -> &str {
        "Delete the enterprise policy"
    }

    fn affected_resources(&self, ctx: &CleanupContext) -> Vec<String> {
        vec![ctx.policy_label()]
    }

    async fn execute(&self, ctx: &mut CleanupContext) -> StepOutcome {
        let policy = match settle(
            ctx.platform.resolve_policy(ctx.store.settings()).await,
            "enterprise policy",
        ) {
            Ok(policy) => policy,
            Err(outcome) => {
                if outcome.is_success() {
                    ctx.mark_cleared(keys::POLICY_ID);
                }
                return outcome;
            }
        };

        let outcome: StepOutcome = match ctx
            .platform
            .arm
            .delete_enterprise_policy(&policy, &ctx.platform.poll)
            .await
        {
            Ok(outcome) => outcome.into(),
            Err(e) => return failed(e),
        };

        if outcome.is_success() {
            ctx.mark_cleared(keys::POLICY_ID);
        }
        outcome
    }
}

/// Delete the resource group and everything left in it.
#[derive(Debug, Default)]
pub struct DeleteResourceGroupStep;

#[async_trait]
impl TeardownStep<CleanupContext> for DeleteResourceGroupStep {
    fn name(&self) -> &str {
        DELETE_RESOURCE_GROUP
    }

    fn description(&self) -> &str {
        "Delete the resource group and every resource in it"
    }

    fn affected_resources(&self, ctx: &CleanupContext) -> Vec<String> {
        vec![ctx.resource_group_label()]
    }

    async fn execute(&self, ctx: &mut CleanupContext) -> StepOutcome {
        let settings = ctx.store.settings();
        if let Err(e) = settings.require(&[keys::SUBSCRIPTION_ID, keys::RESOURCE_GROUP]) {
            return StepOutcome::skipped(e.to_string());
        }
        let (Some(subscription_id), Some(resource_group)) =
            (settings.get(keys::SUBSCRIPTION_ID), settings.get(keys::RESOURCE_GROUP))
        else {
            return StepOutcome::skipped("resource group not configured");
        };

        let outcome: StepOutcome = match ctx
            .platform
            .arm
            .delete_resource_group(subscription_id, resource_group, &ctx.platform.poll)
            .await
        {
            Ok(outcome) => outcome.into(),
            Err(e) => return failed(e),
        };

        // The policy lived in this group.
        if outcome.is_success() {
            ctx.mark_cleared(keys::POLICY_ID);
        }
        outcome
    }
}

/// Remove generated identifiers of deleted resources from the configuration.
#[derive(Debug, Default)]
pub struct ResetConfigStep;

#[async_trait]
impl TeardownStep<CleanupContext> for ResetConfigStep {
    fn name(&self) -> &str {
        RESET_CONFIG
    }

    fn description(&self) -> &str {
        "Remove generated identifiers from the configuration file"
    }

    fn confirm_required(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut CleanupContext) -> StepOutcome {
        let kept: Vec<&str> = GENERATED_KEYS
            .iter()
            .copied()
            .filter(|key| !ctx.cleared.contains(key) && ctx.store.settings().get(key).is_some())
            .collect();
        if !kept.is_empty() {
            warn!("Keeping {} because their resources may still exist", kept.join(", "));
        }

        let cleared = ctx.cleared.clone();
        match ctx.store.reset(&cleared) {
            Ok(removed) if removed.is_empty() => StepOutcome::success("nothing to remove"),
            Ok(removed) => StepOutcome::success(format!("removed {}", removed.join(", "))),
            Err(e) => failed(e),
        }
    }
}
