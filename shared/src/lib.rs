pub mod atlas;
pub mod filters;
pub mod layers;
pub mod normalize;
pub mod throttle;
pub mod tree;

pub use atlas::{AtlasError, AtlasPosition, IconAtlas, Resolution, Strategy, resolve, resolve_traced};
pub use filters::{FilterCommand, FilterController, ToggleState};
pub use layers::{MarkerLayerManager, MarkerSurface};
pub use normalize::{NormalizeReport, Normalized, normalize};
pub use tree::*;
