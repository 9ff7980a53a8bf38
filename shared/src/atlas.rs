use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Cell coordinates of an icon inside the atlas grid (column, row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AtlasPosition {
    pub x: u32,
    pub y: u32,
}

impl AtlasPosition {
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Sprite-sheet metadata emitted by the offline atlas generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconAtlas {
    #[serde(default)]
    pub atlas_url: String,
    pub icon_size: u32,
    pub columns: u32,
    pub rows: u32,
    #[serde(default)]
    pub icon_positions: IndexMap<String, AtlasPosition>,
    #[serde(default)]
    pub resource_mapping: IndexMap<String, AtlasPosition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtlasError {
    Parse(String),
    EmptyGrid { columns: u32, rows: u32 },
    ZeroIconSize,
}

impl std::fmt::Display for AtlasError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtlasError::Parse(msg) => write!(f, "invalid atlas metadata: {msg}"),
            AtlasError::EmptyGrid { columns, rows } => {
                write!(f, "atlas grid is empty ({columns}x{rows})")
            }
            AtlasError::ZeroIconSize => write!(f, "atlas icon size is zero"),
        }
    }
}

impl std::error::Error for AtlasError {}

impl IconAtlas {
    /// Parse and validate atlas metadata. A usable atlas has at least one cell.
    pub fn from_json(json: &str) -> Result<Self, AtlasError> {
        let atlas: Self = serde_json::from_str(json).map_err(|e| AtlasError::Parse(e.to_string()))?;
        atlas.validate()?;
        Ok(atlas)
    }

    pub fn validate(&self) -> Result<(), AtlasError> {
        if self.columns == 0 || self.rows == 0 {
            return Err(AtlasError::EmptyGrid {
                columns: self.columns,
                rows: self.rows,
            });
        }
        if self.icon_size == 0 {
            return Err(AtlasError::ZeroIconSize);
        }
        Ok(())
    }

    pub const fn contains(&self, pos: AtlasPosition) -> bool {
        pos.x < self.columns && pos.y < self.rows
    }

    /// Metadata entries pointing outside the grid. The resolver never serves these.
    pub fn out_of_bounds_entries(&self) -> Vec<(&str, AtlasPosition)> {
        self.icon_positions
            .iter()
            .chain(self.resource_mapping.iter())
            .filter(|(_, pos)| !self.contains(**pos))
            .map(|(key, pos)| (key.as_str(), *pos))
            .collect()
    }

    /// Pixel offset of a cell's top-left corner with cells drawn `cell_px`
    /// wide. Saturates on absurd metadata.
    pub const fn pixel_offset(&self, pos: AtlasPosition, cell_px: u32) -> (u32, u32) {
        (pos.x.saturating_mul(cell_px), pos.y.saturating_mul(cell_px))
    }

    /// Sheet size in pixels with cells drawn `cell_px` wide.
    pub const fn sheet_size(&self, cell_px: u32) -> (u32, u32) {
        (
            self.columns.saturating_mul(cell_px),
            self.rows.saturating_mul(cell_px),
        )
    }

    fn icon(&self, key: &str) -> Option<AtlasPosition> {
        self.icon_positions
            .get(key)
            .copied()
            .filter(|pos| self.contains(*pos))
    }

    fn mapped(&self, key: &str) -> Option<AtlasPosition> {
        self.resource_mapping
            .get(key)
            .copied()
            .filter(|pos| self.contains(*pos))
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

const SIZE_SUFFIX: &str = "_256";

/// Keys tried, in order, when every other strategy misses.
pub const DEFAULT_ATLAS_KEYS: [&str; 2] = ["stone", "limestone"];

/// Display names and icon keys -> atlas file stems. Separate from the
/// icon-key table: this one only papers over atlas filename drift.
const ATLAS_ALIASES: &[(&str, &str)] = &[
    ("limestone", "stone"),
    ("resource_deposits", "stone"),
    ("iron", "iron_new"),
    ("iron_ore", "iron_new"),
    ("copper", "copper_new"),
    ("copper_ore", "copper_new"),
    ("caterium", "cateriumore"),
    ("caterium_ore", "cateriumore"),
    ("coal", "coalore"),
    ("oil", "liquidoil_pipe"),
    ("crude_oil", "liquidoil_pipe"),
    ("water", "liquidwater_pipe"),
    ("geyser", "hotsprings"),
    ("quartz", "quartzcrystal"),
    ("raw_quartz", "quartzcrystal"),
    ("uranium", "uraniumore"),
    ("sam_ore", "samore"),
    ("nitrogen_gas", "nitricacid"),
    ("gas_pillar", "nitricacid"),
    ("gas_pillars", "nitricacid"),
    ("beryl_nut", "nut"),
    ("berylnut", "nut"),
    ("paleberry", "berry"),
    ("spore_flowers", "berry"),
    ("bacon_agaric", "mushroom"),
    ("slug_green", "powersluggreen"),
    ("slug_yellow", "powerslugyellow"),
    ("slug_purple", "powerslugpurple"),
    ("green_power_slug", "powersluggreen"),
    ("blue_power_slug", "powersluggreen"),
    ("yellow_power_slug", "powerslugyellow"),
    ("purple_power_slug", "powerslugpurple"),
    ("hard_drive", "harddrive"),
    ("dropped_items", "harddrive"),
    ("mercer_sphere", "mercer"),
    ("somers_loop", "somersloom"),
];

/// Which resolver step produced a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    SizedIcon,
    ResourceMapping,
    BareIcon,
    PartialIcon,
    Alias,
    Default,
    Origin,
}

impl Strategy {
    pub const fn is_fallback(self) -> bool {
        matches!(self, Self::Default | Self::Origin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub position: AtlasPosition,
    pub strategy: Strategy,
}

type StrategyFn = fn(&IconAtlas, &str) -> Option<AtlasPosition>;

const STRATEGIES: [(Strategy, StrategyFn); 5] = [
    (Strategy::SizedIcon, sized_icon),
    (Strategy::ResourceMapping, resource_mapping),
    (Strategy::BareIcon, bare_icon),
    (Strategy::PartialIcon, partial_icon),
    (Strategy::Alias, alias),
];

/// Exact-match strategies, re-used for alias targets and default keys.
const DIRECT: [StrategyFn; 3] = [sized_icon, resource_mapping, bare_icon];

/// Resolve a free-form resource or icon key to an atlas cell. Never fails:
/// the worst case is a wrong-but-valid icon.
pub fn resolve(atlas: &IconAtlas, key: &str) -> AtlasPosition {
    resolve_traced(atlas, key).position
}

/// Like [`resolve`], also reporting which strategy matched.
pub fn resolve_traced(atlas: &IconAtlas, key: &str) -> Resolution {
    if !key.trim().is_empty() {
        for (strategy, lookup) in STRATEGIES {
            if let Some(position) = lookup(atlas, key) {
                return Resolution { position, strategy };
            }
        }
    }

    match DEFAULT_ATLAS_KEYS
        .iter()
        .find_map(|default| direct(atlas, default))
    {
        Some(position) => Resolution {
            position,
            strategy: Strategy::Default,
        },
        None => Resolution {
            position: AtlasPosition::ORIGIN,
            strategy: Strategy::Origin,
        },
    }
}

/// Lowercase, trim, whitespace runs as underscores.
fn slug_key(key: &str) -> String {
    key.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

fn strip_size_suffix(key: &str) -> &str {
    key.strip_suffix(SIZE_SUFFIX)
        .or_else(|| key.strip_suffix("256"))
        .unwrap_or(key)
}

fn direct(atlas: &IconAtlas, key: &str) -> Option<AtlasPosition> {
    DIRECT.iter().find_map(|lookup| lookup(atlas, key))
}

fn sized_icon(atlas: &IconAtlas, key: &str) -> Option<AtlasPosition> {
    let slug = slug_key(key);
    if slug.ends_with(SIZE_SUFFIX) {
        atlas.icon(&slug)
    } else {
        atlas.icon(&format!("{slug}{SIZE_SUFFIX}"))
    }
}

fn resource_mapping(atlas: &IconAtlas, key: &str) -> Option<AtlasPosition> {
    atlas.mapped(&key.to_lowercase())
}

fn bare_icon(atlas: &IconAtlas, key: &str) -> Option<AtlasPosition> {
    atlas.icon(strip_size_suffix(&slug_key(key)))
}

fn partial_icon(atlas: &IconAtlas, key: &str) -> Option<AtlasPosition> {
    let slug = slug_key(key);
    let needle = strip_size_suffix(&slug);
    if needle.is_empty() {
        return None;
    }
    atlas.icon_positions.iter().find_map(|(candidate, pos)| {
        let candidate = candidate.to_lowercase();
        let clean = strip_size_suffix(&candidate);
        let hit = !clean.is_empty() && (clean.contains(needle) || needle.contains(clean));
        (hit && atlas.contains(*pos)).then_some(*pos)
    })
}

fn alias(atlas: &IconAtlas, key: &str) -> Option<AtlasPosition> {
    let slug = slug_key(key);
    let lookup = strip_size_suffix(&slug);
    let (_, target) = ATLAS_ALIASES.iter().find(|(name, _)| *name == lookup)?;
    direct(atlas, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn atlas(icons: &[(&str, u32, u32)], mapping: &[(&str, u32, u32)]) -> IconAtlas {
        IconAtlas {
            atlas_url: "/public/assets/icon-atlas.png".into(),
            icon_size: 64,
            columns: 5,
            rows: 5,
            icon_positions: icons
                .iter()
                .map(|(k, x, y)| ((*k).to_string(), AtlasPosition::new(*x, *y)))
                .collect(),
            resource_mapping: mapping
                .iter()
                .map(|(k, x, y)| ((*k).to_string(), AtlasPosition::new(*x, *y)))
                .collect(),
        }
    }

    #[test]
    fn unknown_key_falls_back_to_stone() {
        let atlas = atlas(&[("stone_256", 3, 3)], &[]);
        let resolution = resolve_traced(&atlas, "unknown_mineral");
        assert_eq!(resolution.position, AtlasPosition::new(3, 3));
        assert_eq!(resolution.strategy, Strategy::Default);
    }

    #[test]
    fn strategies_apply_in_order() {
        let atlas = atlas(
            &[("iron_256", 0, 0), ("copper", 1, 0), ("icondesc_coalore_256", 2, 0)],
            &[("iron", 4, 4), ("crude oil", 3, 1)],
        );
        let trace = |key| {
            let r = resolve_traced(&atlas, key);
            (r.strategy, r.position)
        };
        assert_eq!(trace("Iron"), (Strategy::SizedIcon, AtlasPosition::new(0, 0)));
        assert_eq!(trace("iron_256"), (Strategy::SizedIcon, AtlasPosition::new(0, 0)));
        assert_eq!(
            trace("Crude Oil"),
            (Strategy::ResourceMapping, AtlasPosition::new(3, 1))
        );
        assert_eq!(trace("copper_256"), (Strategy::BareIcon, AtlasPosition::new(1, 0)));
        assert_eq!(trace("coal"), (Strategy::PartialIcon, AtlasPosition::new(2, 0)));
    }

    #[test]
    fn alias_targets_go_through_direct_lookups() {
        let atlas = atlas(&[("mushroom_256", 1, 2), ("powersluggreen", 0, 4)], &[]);
        assert_eq!(
            resolve_traced(&atlas, "Bacon Agaric"),
            Resolution {
                position: AtlasPosition::new(1, 2),
                strategy: Strategy::Alias,
            }
        );
        assert_eq!(resolve(&atlas, "slug_green"), AtlasPosition::new(0, 4));
    }

    #[test]
    fn out_of_grid_entries_are_ignored() {
        let atlas = atlas(&[("iron_256", 9, 0), ("limestone", 2, 2)], &[("iron", 0, 7)]);
        let resolution = resolve_traced(&atlas, "iron");
        assert_eq!(resolution.strategy, Strategy::Default);
        assert_eq!(resolution.position, AtlasPosition::new(2, 2));
        assert_eq!(atlas.out_of_bounds_entries().len(), 2);
    }

    #[test]
    fn origin_when_no_default_icon_exists() {
        let atlas = atlas(&[("water_256", 1, 1)], &[]);
        let resolution = resolve_traced(&atlas, "zzz");
        assert_eq!(resolution.strategy, Strategy::Origin);
        assert_eq!(resolution.position, AtlasPosition::ORIGIN);
    }

    #[test]
    fn resolve_is_total_and_in_bounds() {
        let atlas = atlas(
            &[("stone_256", 3, 3), ("sulfur_256", 4, 0), ("oob_256", 7, 7), ("_256", 0, 1)],
            &[("quartz", 2, 4), ("broken", 10, 10)],
        );
        let keys = [
            "a", "Iron Ore (Pure)", "   ", "", "broken", "oob", "256", "_256", "s", "sulfur",
            "QUARTZ", "💎 gem", "limestone", "x_256_256",
        ];
        for key in keys {
            let position = resolve(&atlas, key);
            assert!(atlas.contains(position), "{key:?} resolved to {position:?}");
        }
    }

    #[test]
    fn parses_generator_metadata() {
        let atlas = IconAtlas::from_json(
            r#"{"atlasUrl":"/public/assets/icon-atlas.png","iconSize":64,"columns":5,"rows":2,
                "iconPositions":{"stone256":{"x":0,"y":0},"ironnew256":{"x":1,"y":0}},
                "resourceMapping":{"limestone":{"x":0,"y":0}}}"#,
        )
        .expect("valid atlas");
        assert_eq!(atlas.sheet_size(atlas.icon_size), (320, 128));
        assert_eq!(atlas.pixel_offset(AtlasPosition::new(1, 1), atlas.icon_size), (64, 64));
        assert_eq!(atlas.pixel_offset(AtlasPosition::new(u32::MAX, 2), 24), (u32::MAX, 48));
        assert_eq!(
            atlas.icon_positions.keys().collect::<Vec<_>>(),
            vec!["stone256", "ironnew256"]
        );
        assert_eq!(resolve(&atlas, "iron"), AtlasPosition::new(1, 0));
    }

    #[test]
    fn rejects_empty_grid() {
        let err = IconAtlas::from_json(r#"{"iconSize":64,"columns":0,"rows":3}"#)
            .expect_err("empty grid");
        assert_eq!(err, AtlasError::EmptyGrid { columns: 0, rows: 3 });
    }
}
