//! # pplink_platform
//!
//! Enterprise policy link/unlink and environment teardown against Azure
//! Resource Manager and the Power Platform admin API.
//!
//! - **Clients**: `ArmClient` (policies, resource groups) and `AdminClient`
//!   (environments, network injection), each pinned to its token audience
//! - **Locator**: display name to identifier, with pagination and caching
//! - **Flows**: `link`, the cleanup steps and the plans that order them

pub mod admin;
pub mod arm;
pub mod endpoints;
pub mod error;
pub mod link;
pub mod locator;
pub mod models;
pub mod paging;
pub mod plans;
pub mod platform;
pub mod status;
pub mod steps;

pub use admin::{AdminClient, LinkAction};
pub use arm::ArmClient;
pub use endpoints::{ApiVersions, Endpoints, DEFAULT_ADMIN_BASE, DEFAULT_ARM_BASE};
pub use error::{PlatformError, PlatformResult};
pub use link::{link, LinkReport, LinkState};
pub use locator::{RemoteResource, ResourceKind, ResourceLocator};
pub use models::{EnterprisePolicy, Environment, LinkedPolicy, Page};
pub use plans::{cleanup_plan, unlink_plan, CleanupOptions};
pub use platform::{Platform, ResolvedEnvironment};
pub use status::{inspect, NetworkStatus};
pub use steps::{
    CleanupContext, DeleteEnvironmentStep, DeletePolicyStep, DeleteResourceGroupStep,
    ResetConfigStep, UnlinkPolicyStep,
};
