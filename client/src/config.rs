pub const ATLAS_META_URL: &str = "/public/assets/icon-atlas.json";
pub const ATLAS_IMAGE_URL: &str = "/public/assets/icon-atlas.png";
pub const RESOURCES_URL: &str = "/public/data/resources.json";
pub const MAP_IMAGE_URL: &str = "/public/assets/Map.webp";

/// Game world extent on both axes, in game units.
pub const WORLD_HALF_EXTENT: f64 = 500_000.0;
pub const MIN_ZOOM: f64 = -10.0;
pub const MAX_ZOOM: f64 = -4.0;
pub const INITIAL_ZOOM: f64 = -8.0;

/// On-map marker icon edge, in CSS pixels.
pub const MARKER_ICON_PX: u32 = 24;
/// Sidebar row icon edge, in CSS pixels.
pub const SIDEBAR_ICON_PX: u32 = 20;
pub const FALLBACK_MARKER_PX: u32 = 12;

/// Delay before the marker pass so the sidebar paints first.
pub const PLACEMENT_DELAY_MS: u32 = 10;

pub const DEBUG_PANEL_MAX_LINES: usize = 50;
