use std::borrow::Cow;
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use crate::atlas::{self, AtlasPosition, IconAtlas};
use crate::normalize::standardize_icon_key;
use crate::tree::{Marker, Purity, ResourceCatalog, ResourceType};

/// Per-layer count of marker errors that get logged individually.
pub const ERROR_LOG_BUDGET: usize = 10;

/// Fill of the circular marker drawn when an atlas icon cannot be created.
pub const FALLBACK_MARKER_COLOR: &str = "#ff0000";

/// Position on the display surface. One world unit is one map pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayPoint {
    pub x: f64,
    pub y: f64,
}

/// Game coordinates to display coordinates: a vertical flip, no scaling.
pub fn project(x: f64, y: f64) -> DisplayPoint {
    DisplayPoint { x, y: -y }
}

/// Axis-aligned visible region in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl ViewBounds {
    pub fn from_corners(a: DisplayPoint, b: DisplayPoint) -> Self {
        Self {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    pub fn contains(&self, p: DisplayPoint) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerIcon {
    pub sprite: AtlasPosition,
    pub purity: Purity,
}

/// Everything a surface needs to draw one marker.
#[derive(Debug, Clone, Copy)]
pub struct MarkerDraw<'a> {
    pub at: DisplayPoint,
    pub icon: &'a MarkerIcon,
    pub popup: &'a str,
}

/// The scene graph the layer manager drives. Newly placed markers start shown.
pub trait MarkerSurface {
    type Handle;
    type Error: std::fmt::Display;

    fn place(&mut self, draw: &MarkerDraw<'_>) -> Result<Self::Handle, Self::Error>;

    /// Minimal circular marker in [`FALLBACK_MARKER_COLOR`].
    fn place_fallback(
        &mut self,
        at: DisplayPoint,
        popup: &str,
    ) -> Result<Self::Handle, Self::Error>;

    /// Show or hide without detaching the marker from the scene.
    fn set_shown(&mut self, handle: &Self::Handle, shown: bool);

    fn remove(&mut self, handle: Self::Handle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Icon,
    Fallback,
    /// Both the icon and the fallback marker failed; the node is not drawn.
    Dropped,
}

struct PlacedMarker<H> {
    handle: H,
    at: DisplayPoint,
    shown: bool,
}

/// Markers of one resource type. Lives for the whole map session.
pub struct MarkerLayer<H> {
    markers: Vec<PlacedMarker<H>>,
    visible: bool,
    errors: usize,
}

impl<H> MarkerLayer<H> {
    fn new() -> Self {
        Self {
            markers: Vec::new(),
            visible: true,
            errors: 0,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn shown_count(&self) -> usize {
        self.markers.iter().filter(|m| m.shown).count()
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlacementSummary {
    pub layers: usize,
    pub placed: usize,
    pub fallbacks: usize,
    pub dropped: usize,
    /// Icon keys that only resolved through the default fallback.
    pub unresolved: Vec<String>,
}

impl PlacementSummary {
    pub fn total(&self) -> usize {
        self.placed + self.fallbacks
    }
}

/// Owns every marker layer of one map session.
pub struct MarkerLayerManager<S: MarkerSurface> {
    surface: S,
    layers: IndexMap<String, MarkerLayer<S::Handle>>,
    viewport: Option<ViewBounds>,
}

impl<S: MarkerSurface> MarkerLayerManager<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            layers: IndexMap::new(),
            viewport: None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn layer(&self, resource_id: &str) -> Option<&MarkerLayer<S::Handle>> {
        self.layers.get(resource_id)
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn ensure_layer(&mut self, resource_id: &str) -> &MarkerLayer<S::Handle> {
        self.layers
            .entry(resource_id.to_string())
            .or_insert_with(MarkerLayer::new)
    }

    /// Append one marker to a layer, creating the layer if needed. A failed
    /// icon is replaced by the fallback marker; insertion never stops.
    pub fn add_marker(
        &mut self,
        resource_id: &str,
        title: &str,
        marker: &Marker,
        at: DisplayPoint,
        icon: MarkerIcon,
    ) -> Placement {
        let popup = popup_html(title, marker);
        let layer = self
            .layers
            .entry(resource_id.to_string())
            .or_insert_with(MarkerLayer::new);

        let draw = MarkerDraw {
            at,
            icon: &icon,
            popup: &popup,
        };
        let (handle, placement) = match self.surface.place(&draw) {
            Ok(handle) => (handle, Placement::Icon),
            Err(e) => {
                layer.errors += 1;
                let report = layer.errors <= ERROR_LOG_BUDGET;
                if report {
                    warn!(resource = resource_id, error = %e, "marker icon failed, using fallback");
                }
                let fallback = self.surface.place_fallback(at, &popup);
                if layer.errors == ERROR_LOG_BUDGET {
                    warn!(
                        resource = resource_id,
                        "too many marker errors, suppressing further reports for this resource"
                    );
                }
                match fallback {
                    Ok(handle) => (handle, Placement::Fallback),
                    Err(e) => {
                        if report {
                            warn!(resource = resource_id, error = %e, "fallback marker failed, node dropped");
                        }
                        return Placement::Dropped;
                    }
                }
            }
        };

        let shown = layer.visible && in_view(self.viewport, at);
        if !shown {
            self.surface.set_shown(&handle, false);
        }
        layer.markers.push(PlacedMarker { handle, at, shown });
        placement
    }

    /// Show or hide a layer. Markers stay attached to the surface either way.
    /// Returns `false` for unknown ids.
    pub fn set_visible(&mut self, resource_id: &str, visible: bool) -> bool {
        let Some(layer) = self.layers.get_mut(resource_id) else {
            return false;
        };
        layer.visible = visible;
        sync_layer(&mut self.surface, layer, self.viewport);
        true
    }

    pub fn is_visible(&self, resource_id: &str) -> Option<bool> {
        self.layers.get(resource_id).map(MarkerLayer::is_visible)
    }

    /// Restrict shown markers to a region; `None` shows the whole world.
    /// Returns how many markers changed state.
    pub fn set_viewport(&mut self, viewport: Option<ViewBounds>) -> usize {
        self.viewport = viewport;
        self.layers
            .values_mut()
            .map(|layer| sync_layer(&mut self.surface, layer, viewport))
            .sum()
    }

    /// Drop every layer and its markers. Only used for a full data reload.
    pub fn clear(&mut self) {
        for (_, layer) in self.layers.drain(..) {
            for marker in layer.markers {
                self.surface.remove(marker.handle);
            }
        }
    }

    /// Full marker pass over a catalog: one layer per resource type, layer
    /// visibility seeded from `visible`.
    pub fn place_catalog(
        &mut self,
        atlas: &IconAtlas,
        catalog: &ResourceCatalog,
        visible: impl Fn(&str) -> bool,
    ) -> PlacementSummary {
        self.clear();
        let mut summary = PlacementSummary::default();

        for resource in catalog.resources() {
            self.ensure_layer(&resource.id);
            self.set_visible(&resource.id, visible(&resource.id));

            for marker in &resource.markers {
                let key = marker_icon_key(resource, marker);
                let resolution = atlas::resolve_traced(atlas, &key);
                if resolution.strategy.is_fallback() && !summary.unresolved.iter().any(|k| *k == key)
                {
                    summary.unresolved.push(key.to_string());
                }
                let icon = MarkerIcon {
                    sprite: resolution.position,
                    purity: marker.purity,
                };
                let at = project(marker.x, marker.y);
                match self.add_marker(&resource.id, &resource.name, marker, at, icon) {
                    Placement::Icon => summary.placed += 1,
                    Placement::Fallback => summary.fallbacks += 1,
                    Placement::Dropped => summary.dropped += 1,
                }
            }
            summary.layers += 1;
        }

        summary
    }
}

fn in_view(viewport: Option<ViewBounds>, at: DisplayPoint) -> bool {
    viewport.is_none_or(|bounds| bounds.contains(at))
}

fn sync_layer<S: MarkerSurface>(
    surface: &mut S,
    layer: &mut MarkerLayer<S::Handle>,
    viewport: Option<ViewBounds>,
) -> usize {
    let mut changed = 0;
    for marker in &mut layer.markers {
        let want = layer.visible && in_view(viewport, marker.at);
        if marker.shown != want {
            surface.set_shown(&marker.handle, want);
            marker.shown = want;
            changed += 1;
        }
    }
    changed
}

/// Icon key for one node: the node's own type wins over the parent's key.
pub fn marker_icon_key<'a>(resource: &'a ResourceType, marker: &Marker) -> Cow<'a, str> {
    match marker.kind.as_deref() {
        Some(kind) => Cow::Owned(standardize_icon_key(kind, Some(kind))),
        None => Cow::Borrowed(resource.icon_key.as_str()),
    }
}

/// Popup body for a marker.
pub fn popup_html(title: &str, marker: &Marker) -> String {
    let mut html = format!(
        "<strong>{}</strong><br>Purity: {}<br>Coordinates: {}, {}",
        escape_html(title),
        marker.purity.label(),
        marker.x.round(),
        marker.y.round(),
    );
    if let Some(id) = marker.short_id() {
        let _ = write!(html, "<br>ID: {}", escape_html(id));
    }
    html
}

fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['<', '>', '&', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}
