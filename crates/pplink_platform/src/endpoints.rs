//! Base URLs, api versions and the URLs built from them.

use pplink_config::DeploymentSettings;
use serde::{Deserialize, Serialize};

/// Public-cloud Resource Manager endpoint.
pub const DEFAULT_ARM_BASE: &str = "https://management.azure.com";
/// Public-cloud Power Platform admin endpoint.
pub const DEFAULT_ADMIN_BASE: &str = "https://api.bap.microsoft.com";

/// Api versions used per resource family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersions {
    /// `Microsoft.PowerPlatform/enterprisePolicies`.
    pub enterprise_policy: String,
    /// Resource groups.
    pub resource_group: String,
    /// Admin-scope environment list/get/delete.
    pub admin: String,
    /// Network injection link/unlink.
    pub link: String,
}

impl Default for ApiVersions {
    fn default() -> Self {
        Self {
            enterprise_policy: "2020-10-30-preview".to_string(),
            resource_group: "2021-04-01".to_string(),
            admin: "2021-04-01".to_string(),
            link: "2023-06-01".to_string(),
        }
    }
}

impl ApiVersions {
    /// Defaults with any overrides present in `settings` applied.
    pub fn from_settings(settings: &DeploymentSettings) -> Self {
        let mut versions = Self::default();
        if let Some(link) = &settings.link_api_version {
            versions.link = link.clone();
        }
        if let Some(policy) = &settings.policy_api_version {
            versions.enterprise_policy = policy.clone();
        }
        versions
    }
}

/// Where the two control planes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub arm_base: String,
    pub admin_base: String,
    pub versions: ApiVersions,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            arm_base: DEFAULT_ARM_BASE.to_string(),
            admin_base: DEFAULT_ADMIN_BASE.to_string(),
            versions: ApiVersions::default(),
        }
    }
}

impl Endpoints {
    pub fn with_arm_base(mut self, base: impl Into<String>) -> Self {
        self.arm_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_admin_base(mut self, base: impl Into<String>) -> Self {
        self.admin_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_versions(mut self, versions: ApiVersions) -> Self {
        self.versions = versions;
        self
    }

    /// Both planes pointed at one base URL (tests).
    pub fn single(base: impl Into<String>) -> Self {
        let base = base.into();
        Self::default().with_arm_base(base.clone()).with_admin_base(base)
    }

    fn resource_group_path(subscription_id: &str, resource_group: &str) -> String {
        format!("/subscriptions/{}/resourceGroups/{}", subscription_id, resource_group)
    }

    pub fn resource_group_url(&self, subscription_id: &str, resource_group: &str) -> String {
        format!(
            "{}{}?api-version={}",
            self.arm_base,
            Self::resource_group_path(subscription_id, resource_group),
            self.versions.resource_group
        )
    }

    pub fn enterprise_policies_url(&self, subscription_id: &str, resource_group: &str) -> String {
        format!(
            "{}{}/providers/Microsoft.PowerPlatform/enterprisePolicies?api-version={}",
            self.arm_base,
            Self::resource_group_path(subscription_id, resource_group),
            self.versions.enterprise_policy
        )
    }

    pub fn enterprise_policy_url(&self, subscription_id: &str, resource_group: &str, name: &str) -> String {
        format!(
            "{}{}/providers/Microsoft.PowerPlatform/enterprisePolicies/{}?api-version={}",
            self.arm_base,
            Self::resource_group_path(subscription_id, resource_group),
            name,
            self.versions.enterprise_policy
        )
    }

    /// URL of an ARM resource given its full resource id.
    pub fn enterprise_policy_by_id_url(&self, resource_id: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.arm_base,
            resource_id.trim_start_matches('/'),
            self.versions.enterprise_policy
        )
    }

    pub fn environments_url(&self) -> String {
        format!(
            "{}/providers/Microsoft.BusinessAppPlatform/scopes/admin/environments?api-version={}",
            self.admin_base, self.versions.admin
        )
    }

    pub fn environment_url(&self, environment_id: &str) -> String {
        format!(
            "{}/providers/Microsoft.BusinessAppPlatform/scopes/admin/environments/{}?api-version={}",
            self.admin_base, environment_id, self.versions.admin
        )
    }

    /// `action` is `link` or `unlink`.
    pub fn network_injection_url(&self, environment_id: &str, action: &str) -> String {
        format!(
            "{}/providers/Microsoft.BusinessAppPlatform/environments/{}/enterprisePolicies/NetworkInjection/{}?api-version={}",
            self.admin_base, environment_id, action, self.versions.link
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_shapes() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.resource_group_url("sub", "rg"),
            "https://management.azure.com/subscriptions/sub/resourceGroups/rg?api-version=2021-04-01"
        );
        assert_eq!(
            endpoints.environments_url(),
            "https://api.bap.microsoft.com/providers/Microsoft.BusinessAppPlatform/scopes/admin/environments?api-version=2021-04-01"
        );
        assert_eq!(
            endpoints.network_injection_url("env-1", "unlink"),
            "https://api.bap.microsoft.com/providers/Microsoft.BusinessAppPlatform/environments/env-1/enterprisePolicies/NetworkInjection/unlink?api-version=2023-06-01"
        );
    }

    #[test]
    fn test_policy_by_id() {
        let endpoints = Endpoints::single("http://127.0.0.1:9999/");
        let id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.PowerPlatform/enterprisePolicies/p";
        assert_eq!(
            endpoints.enterprise_policy_by_id_url(id),
            format!("http://127.0.0.1:9999{}?api-version=2020-10-30-preview", id)
        );
    }

    #[test]
    fn test_versions_from_settings() {
        let settings = DeploymentSettings {
            link_api_version: Some("2024-01-01".to_string()),
            ..Default::default()
        };
        let versions = ApiVersions::from_settings(&settings);
        assert_eq!(versions.link, "2024-01-01");
        assert_eq!(versions.enterprise_policy, "2020-10-30-preview");
    }
}
