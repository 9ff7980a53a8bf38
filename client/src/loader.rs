use nodemap_shared::{IconAtlas, RawResourceTree};

use crate::config::{ATLAS_META_URL, RESOURCES_URL};

async fn fetch_text(url: &str) -> Result<String, String> {
    let resp = gloo_net::http::Request::get(url)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;

    if !resp.ok() {
        return Err(format!("HTTP {} for {url}", resp.status()));
    }

    resp.text().await.map_err(|e| format!("read error: {e}"))
}

/// Fetch and validate the atlas metadata.
pub async fn fetch_atlas() -> Result<IconAtlas, String> {
    let body = fetch_text(ATLAS_META_URL).await?;
    IconAtlas::from_json(&body).map_err(|e| format!("parse error: {e}"))
}

pub async fn fetch_resource_tree() -> Result<RawResourceTree, String> {
    let body = fetch_text(RESOURCES_URL).await?;
    RawResourceTree::from_json(&body).map_err(|e| format!("parse error: {e}"))
}
