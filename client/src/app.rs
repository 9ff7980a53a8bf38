use std::sync::Arc;

use gloo_timers::callback::Timeout;
use leptos::prelude::*;
use nodemap_shared::throttle::{THROTTLE_DELAY_MS, ThrottleGate};
use nodemap_shared::{
    FilterCommand, FilterController, IconAtlas, MarkerLayerManager, ResourceCatalog, normalize,
};

use crate::config::PLACEMENT_DELAY_MS;
use crate::debug_log::DebugLog;
use crate::icons::{atlas_image_url, preload_atlas_image};
use crate::leaflet::{
    LeafletMap, LeafletSurface, MapListeners, create_map, event_world_point, view_bounds,
};
use crate::loader::{fetch_atlas, fetch_resource_tree};
use crate::sidebar::Sidebar;

/// Everything the sidebar needs once the load sequence has finished.
#[derive(Clone)]
pub(crate) struct LoadedData {
    pub catalog: Arc<ResourceCatalog>,
    pub atlas: Arc<IconAtlas>,
}

/// Leaflet-side state of one map session. Lives on the UI thread only.
#[derive(Default)]
pub(crate) struct MapSession {
    map: Option<LeafletMap>,
    layers: Option<MarkerLayerManager<LeafletSurface>>,
    _listeners: MapListeners,
    throttle: ThrottleGate,
    _pending_view: Option<Timeout>,
    _placement: Option<Timeout>,
}

#[derive(Clone, Copy)]
pub(crate) struct Session(pub StoredValue<MapSession, LocalStorage>);
#[derive(Clone, Copy)]
pub(crate) struct Filters(pub RwSignal<FilterController>);
#[derive(Clone, Copy)]
pub(crate) struct Loaded(pub RwSignal<Option<LoadedData>>);
#[derive(Clone, Copy)]
pub(crate) struct SidebarOpen(pub RwSignal<bool>);
#[derive(Clone, Copy)]
pub(crate) struct DebugOpen(pub RwSignal<bool>);
#[derive(Clone, Copy)]
pub(crate) struct DebugLines(pub RwSignal<DebugLog>);

/// Apply a sidebar command to the toggle state and, once markers exist, to
/// the map layers.
pub(crate) fn dispatch(session: Session, filters: Filters, command: FilterCommand) {
    filters.0.update(|controller| {
        session.0.update_value(|s| match s.layers.as_mut() {
            Some(layers) => {
                controller.dispatch(command, layers);
            }
            None => {
                controller.apply(&command);
            }
        });
    });
}

fn remove_loading_shell() {
    let Some(window) = web_sys::window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };
    if let Some(shell) = document.get_element_by_id("app-loading-shell") {
        shell.remove();
    }
}

fn location_search() -> String {
    web_sys::window()
        .and_then(|window| window.location().search().ok())
        .unwrap_or_default()
}

/// Ask for a visible-marker recomputation. Overlapping requests inside the
/// throttle window collapse into the pending one.
fn schedule_view_update(session: Session) {
    let schedule = session
        .0
        .try_update_value(|s| s.throttle.trigger())
        .unwrap_or(false);
    if !schedule {
        return;
    }
    let timeout = Timeout::new(THROTTLE_DELAY_MS, move || {
        session.0.update_value(|s| {
            if !s.throttle.fire() {
                return;
            }
            if let (Some(map), Some(layers)) = (s.map.as_ref(), s.layers.as_mut()) {
                let changed = layers.set_viewport(Some(view_bounds(map)));
                tracing::debug!(
                    changed,
                    coalesced = s.throttle.dropped(),
                    "visible markers recomputed"
                );
            }
        });
    });
    session.0.update_value(|s| s._pending_view = Some(timeout));
}

/// Full marker pass. Returns how many markers ended up on the map.
fn place_markers(
    session: Session,
    filters: Filters,
    data: LoadedData,
    debug: DebugLines,
) -> usize {
    let summary = session.0.try_update_value(|s| {
        let map = s.map.clone()?;
        let surface = LeafletSurface::new(map.clone(), Arc::clone(&data.atlas));
        let mut layers = MarkerLayerManager::new(surface);
        let summary = filters.0.with_untracked(|controller| {
            layers.place_catalog(&data.atlas, &data.catalog, |id| controller.is_visible(id))
        });
        layers.set_viewport(Some(view_bounds(&map)));
        s.layers = Some(layers);
        Some(summary)
    });
    let Some(summary) = summary.flatten() else {
        return 0;
    };

    tracing::info!(
        layers = summary.layers,
        placed = summary.placed,
        fallbacks = summary.fallbacks,
        dropped = summary.dropped,
        "markers placed"
    );
    debug.0.update(|log| {
        for key in &summary.unresolved {
            log.error(format!("No atlas position for: {key}"));
        }
        log.info(format!(
            "Placed {} markers ({} fallback) in {} layers",
            summary.total(),
            summary.fallbacks,
            summary.layers
        ));
    });
    summary.total()
}

#[component]
pub fn App() -> impl IntoView {
    let session = Session(StoredValue::new_local(MapSession::default()));
    let filters = Filters(RwSignal::new(FilterController::default()));
    let loaded = Loaded(RwSignal::new(None));
    let sidebar_open: RwSignal<bool> = RwSignal::new(true);
    let debug_open: RwSignal<bool> = RwSignal::new(false);
    let debug_lines = DebugLines(RwSignal::new(DebugLog::default()));
    let fatal: RwSignal<Option<String>> = RwSignal::new(None);
    let no_markers: RwSignal<bool> = RwSignal::new(false);
    let cursor: RwSignal<Option<(f64, f64)>> = RwSignal::new(None);

    provide_context(session);
    provide_context(filters);
    provide_context(loaded);
    provide_context(SidebarOpen(sidebar_open));
    provide_context(DebugOpen(debug_open));
    provide_context(debug_lines);

    let map_ref = NodeRef::<leptos::html::Div>::new();
    let load_started = StoredValue::new(false);

    Effect::new(move || {
        if load_started.get_value() {
            return;
        }
        let Some(map_el) = map_ref.get() else {
            return;
        };
        load_started.set_value(true);

        let map = match create_map(&map_el) {
            Ok(map) => map,
            Err(e) => {
                tracing::error!(error = %e, "map init failed");
                fatal.set(Some(format!("Failed to initialize map: {e}")));
                remove_loading_shell();
                return;
            }
        };

        session.0.update_value(|s| {
            let mut listeners = MapListeners::default();
            listeners.listen(&map, &["mousemove"], move |event| {
                cursor.set(event_world_point(&event));
            });
            listeners.listen(&map, &["moveend", "zoomend"], move |_| {
                schedule_view_update(session);
            });
            s._listeners = listeners;
            s.map = Some(map);
        });

        wasm_bindgen_futures::spawn_local(async move {
            let atlas = match fetch_atlas().await {
                Ok(atlas) => atlas,
                Err(e) => {
                    tracing::error!(error = %e, "failed to load icon atlas");
                    debug_lines
                        .0
                        .update(|log| log.error(format!("Failed to load icon atlas: {e}")));
                    fatal.set(Some(format!("Failed to load icon atlas: {e}")));
                    remove_loading_shell();
                    return;
                }
            };
            debug_lines.0.update(|log| {
                log.info(format!(
                    "Atlas loaded: {}x{} grid, {} icons",
                    atlas.columns,
                    atlas.rows,
                    atlas.icon_positions.len()
                ))
            });

            if let Err(e) = preload_atlas_image(atlas_image_url(&atlas)).await {
                tracing::warn!(error = %e, "atlas image preload failed, continuing");
                debug_lines
                    .0
                    .update(|log| log.error(format!("Atlas image preload failed: {e}")));
            }

            let raw = match fetch_resource_tree().await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::error!(error = %e, "failed to load resource data");
                    fatal.set(Some(format!("Failed to load resource data: {e}")));
                    remove_loading_shell();
                    return;
                }
            };
            let normalized = normalize(raw);
            tracing::info!(
                resources = normalized.catalog.resource_count(),
                markers = normalized.catalog.marker_count(),
                removed = normalized.report.total_removed(),
                "resource data loaded"
            );

            let data = LoadedData {
                catalog: Arc::new(normalized.catalog),
                atlas: Arc::new(atlas),
            };
            filters
                .0
                .set(FilterController::from_catalog(&data.catalog, &location_search()));
            loaded.0.set(Some(data.clone()));
            remove_loading_shell();

            let marker_total = data.catalog.marker_count();
            let timeout = Timeout::new(PLACEMENT_DELAY_MS, move || {
                if place_markers(session, filters, data, debug_lines) == 0 {
                    tracing::warn!(marker_total, "no markers added");
                    no_markers.set(true);
                }
            });
            session.0.update_value(|s| s._placement = Some(timeout));
        });
    });

    view! {
        <div style="width: 100%; height: 100%; position: relative; display: flex;">
            <div style="flex: 1; position: relative; background: #0c0e17;">
                <div node_ref=map_ref id="map" style="width: 100%; height: 100%;" />
                <CoordsReadout cursor=cursor />
                {move || no_markers.get().then(|| view! {
                    <div style="position: absolute; top: 16px; left: 50%; transform: translateX(-50%); z-index: 1000; background: #13161f; border: 1px solid #e0524a; border-radius: 6px; padding: 8px 14px; color: #e2e0d8; font-family: 'Inter', system-ui, sans-serif; font-size: 0.8rem;">
                        "No markers added. Check the resource data and the debug panel."
                    </div>
                })}
            </div>
            <Sidebar />
            {move || fatal.get().map(|message| view! {
                <div style="position: fixed; inset: 0; z-index: 2000; background: #0c0e17; display: flex; align-items: center; justify-content: center; flex-direction: column; gap: 8px; color: #e2e0d8; font-family: 'Inter', system-ui, sans-serif;">
                    <h2 style="margin: 0; color: #e0524a;">"Error loading map"</h2>
                    <p style="margin: 0; color: #9a9590; font-family: 'JetBrains Mono', monospace; font-size: 0.8rem;">{message}</p>
                </div>
            })}
        </div>
    }
}

/// `X: .. | Y: ..` readout of the game position under the cursor.
#[component]
fn CoordsReadout(cursor: RwSignal<Option<(f64, f64)>>) -> impl IntoView {
    view! {
        <div style="position: absolute; bottom: 12px; left: 12px; z-index: 1000; background: rgba(19,22,31,0.9); border: 1px solid #282c3e; border-radius: 4px; padding: 4px 8px; color: #e2e0d8; font-family: 'JetBrains Mono', monospace; font-size: 0.72rem; font-variant-numeric: tabular-nums; pointer-events: none;">
            {move || match cursor.get() {
                Some((x, y)) => coords_label(x, y),
                None => "X: - | Y: -".to_string(),
            }}
        </div>
    }
}

pub(crate) fn coords_label(x: f64, y: f64) -> String {
    // `+ 0.0` folds -0 into 0.
    format!("X: {} | Y: {}", x.floor() + 0.0, y.floor() + 0.0)
}
