//! `nextLink` pagination.

use std::collections::HashSet;

use pplink_core::{ApiClient, Audience, CoreError, CoreResult};
use serde_json::Value;
use tracing::debug;

use crate::models::Page;

/// Fetch every page starting at `url`, following `nextLink`.
///
/// Pages are returned in order and kept separate so callers can reason about
/// what was seen together.
pub async fn fetch_all_pages(client: &ApiClient, audience: Audience, url: &str) -> CoreResult<Vec<Vec<Value>>> {
    let mut pages = Vec::new();
    let mut seen = HashSet::new();
    let mut next = Some(url.to_string());

    while let Some(url) = next.take() {
        if !seen.insert(url.clone()) {
            return Err(CoreError::InvalidState(format!("pagination loops back to {}", url)));
        }

        let page: Page = client.get_json(audience, &url).await?;
        debug!("Fetched page {} with {} items", pages.len() + 1, page.value.len());

        next = page.next_link.filter(|link| !link.is_empty());
        pages.push(page.value);
    }

    Ok(pages)
}

/// Every item across all pages.
pub async fn fetch_all(client: &ApiClient, audience: Audience, url: &str) -> CoreResult<Vec<Value>> {
    Ok(fetch_all_pages(client, audience, url).await?.into_iter().flatten().collect())
}
