use indexmap::IndexMap;

use crate::layers::{MarkerLayerManager, MarkerSurface};
use crate::tree::ResourceCatalog;

/// Prefix of every filter key in the share query string.
pub const QUERY_PREFIX: &str = "r_";

/// Layer ids containing one of these (uppercased) are re-asserted on
/// toggle-all, checkbox or not.
const REASSERTED_KEYWORDS: [&str; 4] = ["CRUDE", "OIL", "GAS", "SPORE"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToggleState {
    #[default]
    Visible,
    Hidden,
}

impl ToggleState {
    pub const fn from_visible(visible: bool) -> Self {
        if visible { Self::Visible } else { Self::Hidden }
    }

    pub const fn is_visible(self) -> bool {
        matches!(self, Self::Visible)
    }
}

/// User intent coming from the sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCommand {
    SetVisible { id: String, visible: bool },
    ToggleAll(bool),
}

fn underscored(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut in_space = false;
    for c in id.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Query key for a resource id: `r_` plus the id with whitespace runs as `_`.
pub fn query_key(id: &str) -> String {
    format!("{QUERY_PREFIX}{}", underscored(id))
}

/// Encode inactive resource ids as `r_<id>=0` pairs. Active ids are omitted.
pub fn encode_filter_query<'a>(inactive: impl IntoIterator<Item = &'a str>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for id in inactive {
        serializer.append_pair(&query_key(id), "0");
    }
    serializer.finish()
}

/// Inactive ids (underscored form) from a query string, with or without the
/// leading `?`. Only `r_` keys with value `0` count.
pub fn decode_filter_query(query: &str) -> Vec<String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut ids: Vec<String> = Vec::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let Some(id) = key.strip_prefix(QUERY_PREFIX) else {
            continue;
        };
        if value == "0" && !id.is_empty() && !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// Page URL carrying a filter query. Any existing query or fragment on
/// `base` is replaced.
pub fn share_url(base: &str, query: &str) -> String {
    let end = base.find(['?', '#']).unwrap_or(base.len());
    let base = &base[..end];
    if query.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{query}")
    }
}

fn is_reasserted(id: &str) -> bool {
    let upper = id.to_uppercase();
    REASSERTED_KEYWORDS
        .iter()
        .any(|keyword| upper.contains(keyword))
}

/// Checkbox state for every resource, in sidebar order.
///
/// The toggle-all button keeps its own state: it flips on every press and
/// is not derived from the checkboxes, so a link that pre-hides a few
/// resources still starts with "hide all".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterController {
    toggles: IndexMap<String, ToggleState>,
    all_nodes_visible: bool,
}

impl Default for FilterController {
    fn default() -> Self {
        Self {
            toggles: IndexMap::new(),
            all_nodes_visible: true,
        }
    }
}

impl FilterController {
    /// One toggle per id; `Hidden` only where `query` flags it with `0`.
    pub fn new<I, S>(ids: I, query: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inactive = decode_filter_query(query);
        let toggles = ids
            .into_iter()
            .map(|id| {
                let id: String = id.into();
                let hidden = inactive.contains(&underscored(&id));
                (id, ToggleState::from_visible(!hidden))
            })
            .collect();
        Self {
            toggles,
            all_nodes_visible: true,
        }
    }

    pub fn from_catalog(catalog: &ResourceCatalog, query: &str) -> Self {
        Self::new(catalog.resource_map().into_keys(), query)
    }

    pub fn state(&self, id: &str) -> Option<ToggleState> {
        self.toggles.get(id).copied()
    }

    /// Ids without a toggle count as visible.
    pub fn is_visible(&self, id: &str) -> bool {
        self.state(id).is_none_or(ToggleState::is_visible)
    }

    /// Direction of the last toggle-all, `true` before any press.
    pub fn all_nodes_visible(&self) -> bool {
        self.all_nodes_visible
    }

    /// Command for the next toggle-all press.
    pub fn toggle_all_command(&self) -> FilterCommand {
        FilterCommand::ToggleAll(!self.all_nodes_visible)
    }

    pub fn inactive_ids(&self) -> impl Iterator<Item = &str> {
        self.toggles
            .iter()
            .filter(|(_, state)| !state.is_visible())
            .map(|(id, _)| id.as_str())
    }

    pub fn share_query(&self) -> String {
        encode_filter_query(self.inactive_ids())
    }

    /// Update toggle state only. Returns the ids whose state changed.
    pub fn apply(&mut self, command: &FilterCommand) -> Vec<String> {
        let target = match command {
            FilterCommand::SetVisible { visible, .. } | FilterCommand::ToggleAll(visible) => {
                ToggleState::from_visible(*visible)
            }
        };
        if let FilterCommand::ToggleAll(visible) = command {
            self.all_nodes_visible = *visible;
        }
        let mut changed = Vec::new();
        for (id, state) in &mut self.toggles {
            let selected = match command {
                FilterCommand::SetVisible { id: wanted, .. } => id == wanted,
                FilterCommand::ToggleAll(_) => true,
            };
            if selected && *state != target {
                *state = target;
                changed.push(id.clone());
            }
        }
        changed
    }

    /// Update toggle state and drive the layers to match.
    pub fn dispatch<S: MarkerSurface>(
        &mut self,
        command: FilterCommand,
        layers: &mut MarkerLayerManager<S>,
    ) -> Vec<String> {
        let changed = self.apply(&command);
        match command {
            FilterCommand::SetVisible { id, visible } => {
                layers.set_visible(&id, visible);
            }
            FilterCommand::ToggleAll(visible) => {
                for id in self.toggles.keys() {
                    layers.set_visible(id, visible);
                }
                let reasserted: Vec<String> = layers
                    .layer_ids()
                    .filter(|id| is_reasserted(id))
                    .map(str::to_string)
                    .collect();
                for id in reasserted {
                    layers.set_visible(&id, visible);
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::AtlasPosition;
    use crate::layers::tests::{RecordingSurface, sample_catalog, test_atlas};
    use crate::layers::{DisplayPoint, MarkerIcon, project};
    use crate::tree::{Marker, Purity};
    use pretty_assertions::assert_eq;

    #[test]
    fn query_round_trip_reproduces_inactive_set() {
        let ids = ["iron_ore_(normal)", "coal", "s.a.m._ore", "crude_oil", "ünïcode&=?"];
        for mask in 0u32..(1 << ids.len()) {
            let inactive: Vec<&str> = ids
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, id)| *id)
                .collect();
            let query = encode_filter_query(inactive.iter().copied());
            assert_eq!(decode_filter_query(&query), inactive);
        }
    }

    #[test]
    fn encoding_underscores_whitespace() {
        assert_eq!(encode_filter_query(["Iron Ore", "coal"]), "r_Iron_Ore=0&r_coal=0");
        assert_eq!(encode_filter_query(Vec::<&str>::new()), "");
    }

    #[test]
    fn decoding_ignores_other_keys_and_values() {
        assert_eq!(
            decode_filter_query("?r_coal=0&r_iron=1&zoom=0&r_=0&r_coal=0&r_sulfur=0"),
            vec!["coal".to_string(), "sulfur".to_string()]
        );
        assert!(decode_filter_query("").is_empty());
    }

    #[test]
    fn share_url_replaces_existing_query() {
        assert_eq!(
            share_url("http://localhost:3002/?r_old=0#map", "r_coal=0"),
            "http://localhost:3002/?r_coal=0"
        );
        assert_eq!(share_url("http://localhost:3002/", ""), "http://localhost:3002/");
    }

    #[test]
    fn initial_state_comes_from_query() {
        let controller = FilterController::new(["coal", "iron ore", "sulfur"], "r_coal=0&r_iron_ore=0");
        assert_eq!(controller.state("coal"), Some(ToggleState::Hidden));
        assert_eq!(controller.state("iron ore"), Some(ToggleState::Hidden));
        assert!(controller.is_visible("sulfur"));
        assert!(controller.is_visible("missing"));
        assert!(controller.all_nodes_visible());
        assert_eq!(controller.share_query(), "r_coal=0&r_iron_ore=0");
    }

    #[test]
    fn set_visible_drives_layers() {
        let catalog = sample_catalog();
        let mut layers = MarkerLayerManager::new(RecordingSurface::default());
        let mut controller = FilterController::from_catalog(&catalog, "");
        layers.place_catalog(&test_atlas(), &catalog, |id| controller.is_visible(id));

        let changed = controller.dispatch(
            FilterCommand::SetVisible {
                id: "coal".into(),
                visible: false,
            },
            &mut layers,
        );
        assert_eq!(changed, vec!["coal".to_string()]);
        assert_eq!(layers.is_visible("coal"), Some(false));
        assert_eq!(controller.inactive_ids().collect::<Vec<_>>(), vec!["coal"]);

        let changed = controller.dispatch(
            FilterCommand::SetVisible {
                id: "coal".into(),
                visible: false,
            },
            &mut layers,
        );
        assert!(changed.is_empty());
    }

    #[test]
    fn toggle_all_reasserts_keyword_layers_without_toggles() {
        let catalog = sample_catalog();
        let mut layers = MarkerLayerManager::new(RecordingSurface::default());
        let mut controller = FilterController::from_catalog(&catalog, "");
        layers.place_catalog(&test_atlas(), &catalog, |_| true);

        // A layer the sidebar has no checkbox for.
        let marker = Marker {
            x: 5.0,
            y: 5.0,
            z: None,
            purity: Purity::Pure,
            kind: None,
            path_name: None,
        };
        let icon = MarkerIcon {
            sprite: AtlasPosition::new(3, 3),
            purity: Purity::Pure,
        };
        layers.add_marker("nitrogen_gas", "Nitrogen Gas", &marker, project(5.0, 5.0), icon);
        layers.add_marker("extra_node", "Extra", &marker, project(5.0, 5.0), icon);

        let changed = controller.dispatch(controller.toggle_all_command(), &mut layers);
        assert_eq!(changed.len(), 3);
        assert!(!controller.all_nodes_visible());
        for id in ["iron_ore_(normal)", "coal", "crude_oil", "nitrogen_gas"] {
            assert_eq!(layers.is_visible(id), Some(false), "{id}");
        }
        assert_eq!(layers.is_visible("extra_node"), Some(true));
        assert_eq!(
            layers.surface().points.last(),
            Some(&DisplayPoint { x: 5.0, y: -5.0 })
        );

        controller.dispatch(controller.toggle_all_command(), &mut layers);
        assert!(controller.all_nodes_visible());
        assert_eq!(layers.is_visible("nitrogen_gas"), Some(true));
        assert_eq!(controller.share_query(), "");
    }

    #[test]
    fn toggle_all_first_press_hides_even_when_link_prehides_some() {
        let catalog = sample_catalog();
        let mut layers = MarkerLayerManager::new(RecordingSurface::default());
        let mut controller = FilterController::from_catalog(&catalog, "r_coal=0");
        layers.place_catalog(&test_atlas(), &catalog, |id| controller.is_visible(id));
        assert_eq!(controller.toggle_all_command(), FilterCommand::ToggleAll(false));

        controller.dispatch(controller.toggle_all_command(), &mut layers);
        assert_eq!(controller.inactive_ids().count(), 3);
        assert_eq!(layers.is_visible("iron_ore_(normal)"), Some(false));

        // Single checkboxes leave the toggle-all direction alone.
        controller.dispatch(
            FilterCommand::SetVisible {
                id: "coal".into(),
                visible: true,
            },
            &mut layers,
        );
        assert!(!controller.all_nodes_visible());
        assert_eq!(controller.toggle_all_command(), FilterCommand::ToggleAll(true));

        controller.dispatch(controller.toggle_all_command(), &mut layers);
        assert_eq!(controller.inactive_ids().count(), 0);
        assert_eq!(layers.is_visible("coal"), Some(true));
    }

    #[test]
    fn from_catalog_follows_resource_map_order() {
        let catalog = sample_catalog();
        let controller = FilterController::from_catalog(&catalog, "");
        let ids: Vec<&str> = catalog.resource_map().keys().copied().collect();
        let hidden = FilterController::from_catalog(&catalog, &encode_filter_query(ids.iter().copied()));
        assert_eq!(hidden.inactive_ids().collect::<Vec<_>>(), ids);
        assert!(ids.iter().all(|id| controller.is_visible(id)));
    }
}
