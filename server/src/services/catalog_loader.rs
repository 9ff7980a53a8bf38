use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use nodemap_shared::{AtlasError, IconAtlas, RawResourceTree, normalize};
use tracing::{info, warn};

use crate::config::ServerPaths;
use crate::state::{AppState, CatalogSnapshot};

#[derive(Debug)]
pub enum LoadError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Resources {
        path: PathBuf,
        source: serde_json::Error,
    },
    Atlas {
        path: PathBuf,
        source: AtlasError,
    },
    Serialize(serde_json::Error),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Read { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            LoadError::Resources { path, source } => {
                write!(f, "malformed resource data in {}: {source}", path.display())
            }
            LoadError::Atlas { path, source } => write!(f, "{}: {source}", path.display()),
            LoadError::Serialize(e) => write!(f, "failed to serialize catalog: {e}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Read { source, .. } => Some(source),
            LoadError::Resources { source, .. } => Some(source),
            LoadError::Atlas { source, .. } => Some(source),
            LoadError::Serialize(e) => Some(e),
        }
    }
}

/// Read both data files, normalize the tree and pre-serialize the responses.
pub async fn load_snapshot(paths: &ServerPaths) -> Result<CatalogSnapshot, LoadError> {
    let atlas_text = read(&paths.atlas).await?;
    let atlas = IconAtlas::from_json(&atlas_text).map_err(|source| LoadError::Atlas {
        path: paths.atlas.clone(),
        source,
    })?;
    let out_of_bounds = atlas.out_of_bounds_entries();
    if !out_of_bounds.is_empty() {
        warn!(
            count = out_of_bounds.len(),
            first = out_of_bounds[0].0,
            "atlas metadata has entries outside the grid; they will be ignored"
        );
    }

    let raw_text = read(&paths.resources).await?;
    let raw = RawResourceTree::from_json(&raw_text).map_err(|source| LoadError::Resources {
        path: paths.resources.clone(),
        source,
    })?;

    let snapshot = CatalogSnapshot::new(normalize(raw), atlas).map_err(LoadError::Serialize)?;
    info!(
        resources = snapshot.catalog.resource_count(),
        markers = snapshot.catalog.marker_count(),
        removed = snapshot.report.total_removed(),
        unresolved_icons = snapshot.unresolved_count(),
        "loaded resource catalog"
    );
    Ok(snapshot)
}

async fn read(path: &Path) -> Result<String, LoadError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })
}

async fn modified(paths: &ServerPaths) -> Option<[SystemTime; 2]> {
    let atlas = tokio::fs::metadata(&paths.atlas).await.ok()?.modified().ok()?;
    let resources = tokio::fs::metadata(&paths.resources)
        .await
        .ok()?
        .modified()
        .ok()?;
    Some([atlas, resources])
}

/// Reload the data files whenever their modification times change. A failed
/// reload keeps the previous snapshot.
pub async fn run(state: AppState, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // First tick completes immediately; startup already loaded.
    interval.tick().await;
    let mut last_seen = modified(&state.paths).await;

    loop {
        interval.tick().await;

        let current = modified(&state.paths).await;
        if current.is_none() || current == last_seen {
            continue;
        }
        last_seen = current;

        match load_snapshot(&state.paths).await {
            Ok(snapshot) => {
                state.install(snapshot).await;
                info!("reloaded resource data");
            }
            Err(e) => {
                warn!(error = %e, "failed to reload resource data, keeping previous snapshot");
            }
        }
    }
}
