//! Wire models for the resources pplink touches.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// List envelope shared by ARM and the admin API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub value: Vec<Value>,
    #[serde(rename = "nextLink", default)]
    pub next_link: Option<String>,
}

/// `Microsoft.PowerPlatform/enterprisePolicies` resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnterprisePolicy {
    /// Full ARM resource id.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub properties: Value,
}

impl EnterprisePolicy {
    /// Identifier the admin API expects in link/unlink bodies.
    pub fn system_id(&self) -> Option<&str> {
        self.properties
            .get("systemId")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Power Platform environment as returned by the admin API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub id: String,
    /// Environment identifier (a GUID).
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub properties: Value,
}

/// Network injection policy currently linked to an environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedPolicy {
    /// ARM resource id of the policy.
    pub id: Option<String>,
    pub system_id: Option<String>,
    pub link_status: Option<String>,
}

impl LinkedPolicy {
    /// Whether this link refers to `policy`.
    pub fn refers_to(&self, policy: &EnterprisePolicy) -> bool {
        let same_id = self
            .id
            .as_deref()
            .is_some_and(|id| id.eq_ignore_ascii_case(&policy.id));
        let same_system_id = match (self.system_id.as_deref(), policy.system_id()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        };
        same_id || same_system_id
    }
}

impl Environment {
    pub fn display_name(&self) -> Option<&str> {
        self.properties.get("displayName").and_then(Value::as_str)
    }

    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties.get("provisioningState").and_then(Value::as_str)
    }

    /// The network injection policy, if one is linked.
    ///
    /// The admin API reports it under `properties.enterprisePolicies` as either
    /// `vnets` or `NetworkInjection` depending on api version.
    pub fn network_policy(&self) -> Option<LinkedPolicy> {
        let policies = self.properties.get("enterprisePolicies")?.as_object()?;
        let entry = policies.iter().find_map(|(key, value)| {
            (key.eq_ignore_ascii_case("vnets") || key.eq_ignore_ascii_case("networkinjection")).then_some(value)
        })?;

        let text = |name: &str| entry.get(name).and_then(Value::as_str).map(str::to_string);
        let linked = LinkedPolicy {
            id: text("id"),
            system_id: text("policyId").or_else(|| text("systemId")),
            link_status: text("linkStatus"),
        };
        if linked.id.is_none() && linked.system_id.is_none() {
            return None;
        }
        Some(linked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_policy_system_id() {
        let policy: EnterprisePolicy = serde_json::from_value(json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.PowerPlatform/enterprisePolicies/ep",
            "name": "ep",
            "kind": "NetworkInjection",
            "properties": {"systemId": "/regions/europe/providers/Microsoft.PowerPlatform/enterprisePolicies/abc"}
        }))
        .unwrap();
        assert_eq!(
            policy.system_id(),
            Some("/regions/europe/providers/Microsoft.PowerPlatform/enterprisePolicies/abc")
        );
    }

    #[test]
    fn test_environment_network_policy() {
        let env: Environment = serde_json::from_value(json!({
            "id": "/providers/Microsoft.BusinessAppPlatform/scopes/admin/environments/env-1",
            "name": "env-1",
            "properties": {
                "displayName": "Fabrikam-Tst",
                "enterprisePolicies": {
                    "Vnets": {"id": "/subscriptions/s/x/ep", "policyId": "abc", "linkStatus": "Linked"}
                }
            }
        }))
        .unwrap();

        assert_eq!(env.display_name(), Some("Fabrikam-Tst"));
        let linked = env.network_policy().unwrap();
        assert_eq!(linked.system_id.as_deref(), Some("abc"));
        assert_eq!(linked.link_status.as_deref(), Some("Linked"));
    }

    #[test]
    fn test_environment_without_policy() {
        let env: Environment = serde_json::from_value(json!({
            "name": "env-1",
            "properties": {"displayName": "Fabrikam-Tst"}
        }))
        .unwrap();
        assert!(env.network_policy().is_none());
    }
}
