use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use nodemap_shared::{
    AtlasPosition, IconAtlas, NormalizeReport, Normalized, ResourceCatalog, Strategy,
    resolve_traced,
};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::ServerPaths;

/// Resolver outcome for one resource, as listed by `/api/debug/icons`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IconDebugEntry {
    pub id: String,
    pub name: String,
    pub icon_key: String,
    pub position: AtlasPosition,
    pub strategy: Strategy,
    pub marker_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct IconDebugReport<'a> {
    columns: u32,
    rows: u32,
    icon_size: u32,
    icon_count: usize,
    out_of_bounds: Vec<&'a str>,
    unresolved: Vec<&'a str>,
    resources: &'a [IconDebugEntry],
}

/// Catalog and atlas as loaded from disk, serialized once per load and
/// shared by all requests via Arc.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub catalog: Arc<ResourceCatalog>,
    pub report: NormalizeReport,
    pub atlas: Option<Arc<IconAtlas>>,
    pub icons: Vec<IconDebugEntry>,
    pub catalog_json: Arc<Bytes>,
    pub icons_json: Arc<Bytes>,
    pub etag: String,
    pub loaded_at: DateTime<Utc>,
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        let catalog_json = Bytes::from_static(br#"{"categories":[]}"#);
        Self {
            etag: catalog_etag(&catalog_json),
            catalog: Arc::new(ResourceCatalog::default()),
            report: NormalizeReport::default(),
            atlas: None,
            icons: Vec::new(),
            catalog_json: Arc::new(catalog_json),
            icons_json: Arc::new(Bytes::from_static(b"null")),
            loaded_at: Utc::now(),
        }
    }
}

impl CatalogSnapshot {
    pub fn new(normalized: Normalized, atlas: IconAtlas) -> Result<Self, serde_json::Error> {
        let Normalized { catalog, report } = normalized;
        let catalog_json = Bytes::from(serde_json::to_vec(&catalog)?);

        let icons: Vec<IconDebugEntry> = catalog
            .resources()
            .map(|resource| {
                let resolution = resolve_traced(&atlas, &resource.icon_key);
                IconDebugEntry {
                    id: resource.id.clone(),
                    name: resource.name.clone(),
                    icon_key: resource.icon_key.clone(),
                    position: resolution.position,
                    strategy: resolution.strategy,
                    marker_count: resource.markers.len(),
                }
            })
            .collect();
        let icons_json = Bytes::from(serde_json::to_vec(&IconDebugReport {
            columns: atlas.columns,
            rows: atlas.rows,
            icon_size: atlas.icon_size,
            icon_count: atlas.icon_positions.len(),
            out_of_bounds: atlas
                .out_of_bounds_entries()
                .into_iter()
                .map(|(key, _)| key)
                .collect(),
            unresolved: icons
                .iter()
                .filter(|entry| entry.strategy.is_fallback())
                .map(|entry| entry.id.as_str())
                .collect(),
            resources: &icons,
        })?);

        Ok(Self {
            etag: catalog_etag(&catalog_json),
            catalog: Arc::new(catalog),
            report,
            atlas: Some(Arc::new(atlas)),
            icons,
            catalog_json: Arc::new(catalog_json),
            icons_json: Arc::new(icons_json),
            loaded_at: Utc::now(),
        })
    }

    pub fn unresolved_count(&self) -> usize {
        self.icons
            .iter()
            .filter(|entry| entry.strategy.is_fallback())
            .count()
    }
}

/// Content hash of the serialized catalog, so identical reloads keep the tag.
fn catalog_etag(json: &[u8]) -> String {
    format!("\"resources-{:08x}\"", crc32fast::hash(json))
}

#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<RwLock<CatalogSnapshot>>,
    pub paths: Arc<ServerPaths>,
    /// Successful loads since startup, the initial one included.
    pub generation: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(paths: ServerPaths) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(CatalogSnapshot::default())),
            paths: Arc::new(paths),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn install(&self, snapshot: CatalogSnapshot) {
        *self.snapshot.write().await = snapshot;
        self.generation.fetch_add(1, Ordering::Relaxed);
    }
}
