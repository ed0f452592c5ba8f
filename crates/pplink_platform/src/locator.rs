//! Display name to resource identifier resolution.
//!
//! Neither control plane offers lookup by display name, so the locator lists
//! every resource of a kind (following `nextLink`), then matches exactly and
//! case-sensitively on `properties.displayName`, falling back to `name` for
//! ARM resources that have no display name. The first match in enumeration
//! order wins. Listings are cached for the lifetime of the locator, which is
//! one CLI invocation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use pplink_core::{ApiClient, Audience, CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::endpoints::Endpoints;
use crate::paging;

/// What to look for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceKind {
    /// Power Platform environment, admin scope.
    Environment,
    /// Enterprise policy in one resource group.
    EnterprisePolicy {
        subscription_id: String,
        resource_group: String,
    },
}

impl ResourceKind {
    pub fn audience(&self) -> Audience {
        match self {
            ResourceKind::Environment => Audience::PowerPlatformAdmin,
            ResourceKind::EnterprisePolicy { .. } => Audience::ResourceManager,
        }
    }

    fn list_url(&self, endpoints: &Endpoints) -> String {
        match self {
            ResourceKind::Environment => endpoints.environments_url(),
            ResourceKind::EnterprisePolicy {
                subscription_id,
                resource_group,
            } => endpoints.enterprise_policies_url(subscription_id, resource_group),
        }
    }

    /// Whether `name` is a fallback match target for this kind.
    fn matches_resource_name(&self) -> bool {
        matches!(self, ResourceKind::EnterprisePolicy { .. })
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Environment => f.write_str("environment"),
            ResourceKind::EnterprisePolicy { resource_group, .. } => {
                write!(f, "enterprise policy in {}", resource_group)
            }
        }
    }
}

/// A resolved remote resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResource {
    pub kind: ResourceKind,
    /// Full resource path.
    pub id: String,
    /// Identifier used in URLs (environment GUID, ARM resource name).
    pub name: String,
    pub display_name: Option<String>,
    pub properties: Value,
}

impl RemoteResource {
    fn from_value(kind: &ResourceKind, value: &Value) -> Option<Self> {
        let name = value.get("name").and_then(Value::as_str)?.to_string();
        let properties = value.get("properties").cloned().unwrap_or(Value::Null);
        Some(Self {
            kind: kind.clone(),
            id: value
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or(&name)
                .to_string(),
            display_name: properties
                .get("displayName")
                .and_then(Value::as_str)
                .map(str::to_string),
            name,
            properties,
        })
    }

    fn matches(&self, wanted: &str) -> bool {
        match &self.display_name {
            Some(display_name) => display_name == wanted,
            None => self.kind.matches_resource_name() && self.name == wanted,
        }
    }

    /// Name shown to operators.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Labels listed more than once across all pages, in first-seen order.
fn duplicate_labels(pages: &[Vec<Value>]) -> Vec<(&str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in pages.iter().flatten() {
        let Some(label) = value
            .pointer("/properties/displayName")
            .or_else(|| value.get("name"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        match counts.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }
    counts.retain(|(_, count)| *count > 1);
    counts
}

/// Resolves display names, caching each kind's listing.
pub struct ResourceLocator {
    client: ApiClient,
    endpoints: Arc<Endpoints>,
    cache: Mutex<HashMap<ResourceKind, Arc<Vec<RemoteResource>>>>,
}

impl ResourceLocator {
    pub fn new(client: ApiClient, endpoints: Arc<Endpoints>) -> Self {
        Self {
            client,
            endpoints,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Every resource of `kind`, in enumeration order.
    pub async fn list(&self, kind: &ResourceKind) -> CoreResult<Arc<Vec<RemoteResource>>> {
        if let Some(cached) = self.cache.lock().get(kind).cloned() {
            debug!("Using cached {} listing ({} items)", kind, cached.len());
            return Ok(cached);
        }

        let url = kind.list_url(&self.endpoints);
        let pages = paging::fetch_all_pages(&self.client, kind.audience(), &url).await?;

        let mut resources = Vec::new();
        for value in pages.iter().flatten() {
            match RemoteResource::from_value(kind, value) {
                Some(resource) => resources.push(resource),
                None => warn!("Skipping {} entry without a name", kind),
            }
        }
        for (label, count) in duplicate_labels(&pages) {
            warn!("{} '{}' appears {} times; the first one listed is used", kind, label, count);
        }

        debug!("Listed {} {} resources across {} pages", resources.len(), kind, pages.len());
        let resources = Arc::new(resources);
        self.cache.lock().insert(kind.clone(), resources.clone());
        Ok(resources)
    }

    /// First resource of `kind` whose display name is exactly `display_name`.
    pub async fn find_by_display_name(&self, kind: &ResourceKind, display_name: &str) -> CoreResult<RemoteResource> {
        let resources = self.list(kind).await?;
        resources
            .iter()
            .find(|r| r.matches(display_name))
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("{} '{}'", kind, display_name)))
    }

    /// Drop cached listings, e.g. after deleting something.
    pub fn forget(&self, kind: &ResourceKind) {
        self.cache.lock().remove(kind);
    }
}

impl fmt::Debug for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLocator")
            .field("endpoints", &self.endpoints)
            .field("cached_kinds", &self.cache.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pplink_core::{CredentialProvider, HttpResponse, MockTransport, StaticTokenSource};
    use serde_json::json;

    fn locator(mock: &MockTransport) -> ResourceLocator {
        let source = StaticTokenSource::new()
            .with_token(Audience::ResourceManager, "arm")
            .with_token(Audience::PowerPlatformAdmin, "bap");
        let client = ApiClient::new(
            Arc::new(mock.clone()),
            Arc::new(CredentialProvider::new(Arc::new(source))),
        );
        ResourceLocator::new(client, Arc::new(Endpoints::single("https://api.test")))
    }

    fn env(name: &str, display_name: &str) -> Value {
        json!({"id": format!("/environments/{}", name), "name": name, "properties": {"displayName": display_name}})
    }

    #[tokio::test]
    async fn test_exact_match_first_wins() {
        let mock = MockTransport::new().add_response(HttpResponse::new(200).with_json(json!({
            "value": [
                env("env-prod", "Fabrikam-Prod"),
                env("env-tst", "Fabrikam-Tst"),
                env("env-tst-2", "Fabrikam-Tst"),
                env("env-lower", "fabrikam-tst"),
            ]
        })));
        let locator = locator(&mock);

        let found = locator
            .find_by_display_name(&ResourceKind::Environment, "Fabrikam-Tst")
            .await
            .unwrap();
        assert_eq!(found.name, "env-tst");
        assert_eq!(mock.get_calls()[0].authorization.as_deref(), Some("Bearer bap"));
    }

    #[test]
    fn test_duplicates_counted_across_pages() {
        let pages = vec![
            vec![env("env-tst", "Fabrikam-Tst"), env("env-prod", "Fabrikam-Prod")],
            vec![env("env-tst-2", "Fabrikam-Tst")],
        ];
        assert_eq!(duplicate_labels(&pages), vec![("Fabrikam-Tst", 2)]);
    }

    #[tokio::test]
    async fn test_listing_is_cached() {
        let mock = MockTransport::new().add_response(HttpResponse::new(200).with_json(json!({
            "value": [env("env-tst", "Fabrikam-Tst")]
        })));
        let locator = locator(&mock);

        locator.find_by_display_name(&ResourceKind::Environment, "Fabrikam-Tst").await.unwrap();
        let missing = locator.find_by_display_name(&ResourceKind::Environment, "Contoso").await;

        assert!(missing.unwrap_err().is_not_found());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_policy_falls_back_to_resource_name() {
        let mock = MockTransport::new().add_response(HttpResponse::new(200).with_json(json!({
            "value": [{"id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.PowerPlatform/enterprisePolicies/ep-1", "name": "ep-1", "properties": {"systemId": "sys-1"}}]
        })));
        let locator = locator(&mock);
        let kind = ResourceKind::EnterprisePolicy {
            subscription_id: "s".to_string(),
            resource_group: "rg".to_string(),
        };

        let found = locator.find_by_display_name(&kind, "ep-1").await.unwrap();
        assert_eq!(found.properties["systemId"], "sys-1");
        assert_eq!(mock.get_calls()[0].authorization.as_deref(), Some("Bearer arm"));
    }

    #[tokio::test]
    async fn test_environment_does_not_match_on_guid() {
        let mock = MockTransport::new().add_response(HttpResponse::new(200).with_json(json!({
            "value": [{"name": "env-1", "properties": {}}]
        })));
        let locator = locator(&mock);

        let result = locator.find_by_display_name(&ResourceKind::Environment, "env-1").await;
        assert!(result.unwrap_err().is_not_found());
    }
}
