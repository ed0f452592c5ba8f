//! Predefined teardown plans.

use std::sync::Arc;

use pplink_core::{ConfirmationGate, TeardownSequencer};

use crate::steps::{
    CleanupContext, DeleteEnvironmentStep, DeletePolicyStep, DeleteResourceGroupStep,
    ResetConfigStep, UnlinkPolicyStep,
};

/// Which parts of the cleanup to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOptions {
    pub skip_unlink: bool,
    pub skip_environment: bool,
    pub skip_policy: bool,
    pub skip_resource_group: bool,
    /// Clear generated identifiers once their resources are gone.
    pub reset_config: bool,
}

/// Full cleanup: unlink policy -> delete environment -> delete policy -> delete resource group.
pub fn cleanup_plan(gate: Arc<dyn ConfirmationGate>, options: &CleanupOptions) -> TeardownSequencer<CleanupContext> {
    let mut plan = TeardownSequencer::new("cleanup", gate);
    if !options.skip_unlink {
        plan = plan.step(Arc::new(UnlinkPolicyStep));
    }
    if !options.skip_environment {
        plan = plan.step(Arc::new(DeleteEnvironmentStep));
    }
    if !options.skip_policy {
        plan = plan.step(Arc::new(DeletePolicyStep));
    }
    if !options.skip_resource_group {
        plan = plan.step(Arc::new(DeleteResourceGroupStep));
    }
    if options.reset_config {
        plan = plan.step(Arc::new(ResetConfigStep));
    }
    plan
}

/// Unlink only.
pub fn unlink_plan(gate: Arc<dyn ConfirmationGate>) -> TeardownSequencer<CleanupContext> {
    TeardownSequencer::new("unlink", gate).step(Arc::new(UnlinkPolicyStep))
}
