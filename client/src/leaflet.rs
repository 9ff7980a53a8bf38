#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

//! Thin binding over the page-global Leaflet (`L`) and the marker surface
//! built on it.

use std::sync::Arc;

use js_sys::{Array, Function, Object, Reflect};
use nodemap_shared::layers::{DisplayPoint, MarkerDraw, MarkerSurface, ViewBounds};
use nodemap_shared::IconAtlas;
use serde::Serialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::wasm_bindgen;
use web_sys::HtmlElement;

use crate::config::{
    FALLBACK_MARKER_PX, INITIAL_ZOOM, MAP_IMAGE_URL, MARKER_ICON_PX, MAX_ZOOM, MIN_ZOOM,
    WORLD_HALF_EXTENT,
};
use crate::icons::{fallback_marker_html, marker_icon_html, purity_class};

#[wasm_bindgen]
extern "C" {
    #[derive(Clone)]
    pub type LeafletMap;
    #[derive(Clone)]
    pub type LeafletMarker;
    pub type LeafletLayer;
    pub type DivIcon;
    pub type LatLngBounds;
    pub type LatLng;
    pub type LeafletMouseEvent;

    #[wasm_bindgen(catch, js_namespace = L, js_name = map)]
    fn leaflet_map(element: &HtmlElement, options: &JsValue) -> Result<LeafletMap, JsValue>;

    #[wasm_bindgen(catch, js_namespace = L, js_name = imageOverlay)]
    fn image_overlay(url: &str, bounds: &JsValue) -> Result<LeafletLayer, JsValue>;

    #[wasm_bindgen(catch, js_namespace = L, js_name = divIcon)]
    fn div_icon(options: &JsValue) -> Result<DivIcon, JsValue>;

    #[wasm_bindgen(catch, js_namespace = L, js_name = marker)]
    fn leaflet_marker(at: &JsValue, options: &JsValue) -> Result<LeafletMarker, JsValue>;

    #[wasm_bindgen(method, js_name = setView)]
    fn set_view(this: &LeafletMap, center: &JsValue, zoom: f64);

    #[wasm_bindgen(method, js_name = setMaxBounds)]
    fn set_max_bounds(this: &LeafletMap, bounds: &JsValue);

    #[wasm_bindgen(method, js_name = getBounds)]
    fn get_bounds(this: &LeafletMap) -> LatLngBounds;

    #[wasm_bindgen(method, js_name = on)]
    fn on(this: &LeafletMap, event: &str, handler: &Function);

    #[wasm_bindgen(method, js_name = getSouthWest)]
    fn south_west(this: &LatLngBounds) -> LatLng;

    #[wasm_bindgen(method, js_name = getNorthEast)]
    fn north_east(this: &LatLngBounds) -> LatLng;

    #[wasm_bindgen(method, getter)]
    fn lat(this: &LatLng) -> f64;

    #[wasm_bindgen(method, getter)]
    fn lng(this: &LatLng) -> f64;

    #[wasm_bindgen(method, getter)]
    fn latlng(this: &LeafletMouseEvent) -> LatLng;

    #[wasm_bindgen(catch, method, js_name = addTo)]
    fn add_layer_to(this: &LeafletLayer, map: &LeafletMap) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, method, js_name = addTo)]
    fn add_marker_to(this: &LeafletMarker, map: &LeafletMap) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = bindPopup)]
    fn bind_popup(this: &LeafletMarker, html: &str);

    #[wasm_bindgen(method, js_name = setOpacity)]
    fn set_opacity(this: &LeafletMarker, opacity: f64);

    #[wasm_bindgen(method, js_name = getElement)]
    fn get_element(this: &LeafletMarker) -> Option<HtmlElement>;

    #[wasm_bindgen(method, js_name = remove)]
    fn remove_marker(this: &LeafletMarker);
}

fn js_error(context: &str, err: JsValue) -> String {
    match err.as_string() {
        Some(message) => format!("{context}: {message}"),
        None => format!("{context}: {err:?}"),
    }
}

fn pair(a: f64, b: f64) -> JsValue {
    Array::of2(&JsValue::from_f64(a), &JsValue::from_f64(b)).into()
}

/// Leaflet `[lat, lng]` for a display point.
fn lat_lng(at: DisplayPoint) -> JsValue {
    pair(at.y, at.x)
}

fn crs_simple() -> Result<JsValue, String> {
    let leaflet = Reflect::get(&js_sys::global(), &JsValue::from_str("L"))
        .map_err(|e| js_error("Leaflet missing", e))?;
    if leaflet.is_undefined() {
        return Err("Leaflet missing: window.L is undefined".into());
    }
    let crs = Reflect::get(&leaflet, &JsValue::from_str("CRS"))
        .map_err(|e| js_error("Leaflet CRS missing", e))?;
    Reflect::get(&crs, &JsValue::from_str("Simple"))
        .map_err(|e| js_error("Leaflet CRS missing", e))
}

fn world_bounds() -> JsValue {
    Array::of2(
        &pair(-WORLD_HALF_EXTENT, -WORLD_HALF_EXTENT),
        &pair(WORLD_HALF_EXTENT, WORLD_HALF_EXTENT),
    )
    .into()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MapOptions {
    min_zoom: f64,
    max_zoom: f64,
    zoom_control: bool,
    attribution_control: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IconOptions<'a> {
    class_name: &'a str,
    html: &'a str,
    icon_size: [f64; 2],
    icon_anchor: [f64; 2],
    popup_anchor: [f64; 2],
}

impl<'a> IconOptions<'a> {
    fn square(class_name: &'a str, html: &'a str, size_px: u32) -> Self {
        let size = f64::from(size_px);
        Self {
            class_name,
            html,
            icon_size: [size, size],
            icon_anchor: [size / 2.0, size / 2.0],
            popup_anchor: [0.0, -size / 2.0],
        }
    }

    fn to_js(&self) -> Result<JsValue, String> {
        serde_wasm_bindgen::to_value(self).map_err(|e| format!("icon options: {e}"))
    }
}

/// Map with a flat CRS, the world image stretched over the game bounds and
/// panning clamped to them.
pub fn create_map(element: &HtmlElement) -> Result<LeafletMap, String> {
    let options = serde_wasm_bindgen::to_value(&MapOptions {
        min_zoom: MIN_ZOOM,
        max_zoom: MAX_ZOOM,
        zoom_control: true,
        attribution_control: false,
    })
    .map_err(|e| format!("map options: {e}"))?;
    Reflect::set(&options, &JsValue::from_str("crs"), &crs_simple()?)
        .map_err(|e| js_error("option error", e))?;
    let map = leaflet_map(element, &options).map_err(|e| js_error("map init failed", e))?;

    let bounds = world_bounds();
    image_overlay(MAP_IMAGE_URL, &bounds)
        .and_then(|overlay| overlay.add_layer_to(&map))
        .map_err(|e| js_error("map image failed", e))?;
    map.set_view(&pair(0.0, 0.0), INITIAL_ZOOM);
    map.set_max_bounds(&bounds);
    Ok(map)
}

/// Current view in display coordinates.
pub fn view_bounds(map: &LeafletMap) -> ViewBounds {
    let bounds = map.get_bounds();
    let sw = bounds.south_west();
    let ne = bounds.north_east();
    ViewBounds::from_corners(
        DisplayPoint {
            x: sw.lng(),
            y: sw.lat(),
        },
        DisplayPoint {
            x: ne.lng(),
            y: ne.lat(),
        },
    )
}

/// Game coordinates under a mouse event.
pub fn event_world_point(event: &JsValue) -> Option<(f64, f64)> {
    let event: &LeafletMouseEvent = event.unchecked_ref();
    let at = event.latlng();
    let (lng, lat) = (at.lng(), at.lat());
    (lng.is_finite() && lat.is_finite()).then_some((lng, -lat))
}

/// Keeps Leaflet event closures alive for the lifetime of the map.
#[derive(Default)]
pub struct MapListeners {
    handlers: Vec<Closure<dyn FnMut(JsValue)>>,
}

impl MapListeners {
    pub fn listen(
        &mut self,
        map: &LeafletMap,
        events: &[&str],
        handler: impl FnMut(JsValue) + 'static,
    ) {
        let closure = Closure::<dyn FnMut(JsValue)>::new(handler);
        for event in events {
            map.on(event, closure.as_ref().unchecked_ref());
        }
        self.handlers.push(closure);
    }
}

/// Marker surface drawing atlas sprites as Leaflet div-icon markers.
pub struct LeafletSurface {
    map: LeafletMap,
    atlas: Arc<IconAtlas>,
}

impl LeafletSurface {
    pub fn new(map: LeafletMap, atlas: Arc<IconAtlas>) -> Self {
        Self { map, atlas }
    }

    fn add(
        &self,
        at: DisplayPoint,
        icon: &DivIcon,
        popup: &str,
    ) -> Result<LeafletMarker, String> {
        let options = Object::new();
        Reflect::set(&options, &JsValue::from_str("icon"), icon)
            .map_err(|e| js_error("option error", e))?;
        let marker =
            leaflet_marker(&lat_lng(at), &options).map_err(|e| js_error("marker failed", e))?;
        marker.bind_popup(popup);
        marker
            .add_marker_to(&self.map)
            .map_err(|e| js_error("marker attach failed", e))?;
        Ok(marker)
    }
}

impl MarkerSurface for LeafletSurface {
    type Handle = LeafletMarker;
    type Error = String;

    fn place(&mut self, draw: &MarkerDraw<'_>) -> Result<LeafletMarker, String> {
        let sprite = draw.icon.sprite;
        if !self.atlas.contains(sprite) {
            return Err(format!("sprite ({}, {}) outside atlas", sprite.x, sprite.y));
        }
        let html = marker_icon_html(&self.atlas, sprite, MARKER_ICON_PX);
        let options =
            IconOptions::square(purity_class(draw.icon.purity), &html, MARKER_ICON_PX).to_js()?;
        let icon = div_icon(&options).map_err(|e| js_error("icon failed", e))?;
        self.add(draw.at, &icon, draw.popup)
    }

    fn place_fallback(&mut self, at: DisplayPoint, popup: &str) -> Result<LeafletMarker, String> {
        let html = fallback_marker_html();
        let options = IconOptions::square("default-icon", &html, FALLBACK_MARKER_PX).to_js()?;
        let icon = div_icon(&options).map_err(|e| js_error("fallback icon failed", e))?;
        self.add(at, &icon, popup)
    }

    fn set_shown(&mut self, marker: &LeafletMarker, shown: bool) {
        marker.set_opacity(if shown { 1.0 } else { 0.0 });
        if let Some(el) = marker.get_element() {
            let display = if shown { "" } else { "none" };
            el.style().set_property("display", display).ok();
        }
    }

    fn remove(&mut self, marker: LeafletMarker) {
        marker.remove_marker();
    }
}
