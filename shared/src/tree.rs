use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Quality tier of a resource node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Purity {
    Impure,
    Normal,
    Pure,
    #[default]
    Unknown,
}

const PURITY_TAGS: [(&str, Purity); 4] = [
    ("(impure)", Purity::Impure),
    ("(normal)", Purity::Normal),
    ("(pure)", Purity::Pure),
    ("(unknown)", Purity::Unknown),
];

impl Purity {
    /// Parse a purity value from the raw data. Accepts plain names in any case,
    /// the `RP_` prefixed game identifiers and the game's `Inpure` spelling.
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_ascii_lowercase();
        let lower = lower.strip_prefix("rp_").unwrap_or(&lower);
        match lower {
            "impure" | "inpure" => Some(Self::Impure),
            "normal" => Some(Self::Normal),
            "pure" => Some(Self::Pure),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Purity carried by a parenthesized annotation in a display name,
    /// e.g. `"Iron Ore (Pure)"`.
    pub fn from_name_annotation(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        PURITY_TAGS
            .iter()
            .find(|(tag, _)| lower.contains(tag))
            .map(|(_, purity)| *purity)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Impure => "Impure",
            Self::Normal => "Normal",
            Self::Pure => "Pure",
            Self::Unknown => "Unknown",
        }
    }

    pub(crate) fn annotation_tags() -> impl Iterator<Item = &'static str> {
        PURITY_TAGS.iter().map(|(tag, _)| *tag)
    }
}

// ---------------------------------------------------------------------------
// Raw `resources.json` shape. Every field is optional; the normalizer decides
// what survives. Nulls, wrong-typed fields and non-object list entries read
// as absent instead of failing the whole file.
// ---------------------------------------------------------------------------

mod lenient {
    use serde::de::{DeserializeOwned, Deserializer};
    use serde::Deserialize;
    use serde_json::Value;

    /// Non-array values read as an empty list. Entries that are not objects,
    /// or fail to deserialize, become `None`.
    pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let Value::Array(items) = Value::deserialize(deserializer)? else {
            return Ok(Vec::new());
        };
        Ok(items
            .into_iter()
            .map(|item| match item {
                Value::Object(_) => T::deserialize(item).ok(),
                _ => None,
            })
            .collect())
    }

    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Value::deserialize(deserializer)?.as_f64())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawResourceTree {
    #[serde(default, deserialize_with = "lenient::list")]
    pub options: Vec<Option<RawCategory>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCategory {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, rename = "tabId", deserialize_with = "lenient::string")]
    pub tab_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub options: Vec<Option<RawSubcategory>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSubcategory {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient::string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub options: Vec<Option<RawResourceType>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawResourceType {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, rename = "layerId", deserialize_with = "lenient::string")]
    pub layer_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub purity: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient::string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub markers: Vec<Option<RawMarker>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMarker {
    #[serde(default, deserialize_with = "lenient::number")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub z: Option<f64>,
    #[serde(default, rename = "type", deserialize_with = "lenient::string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub purity: Option<String>,
    #[serde(default, rename = "pathName", deserialize_with = "lenient::string")]
    pub path_name: Option<String>,
}

impl RawResourceTree {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Normalized catalog, handed to consumers as an immutable snapshot.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceCatalog {
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub subcategories: Vec<Subcategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: String,
    pub resources: Vec<ResourceType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceType {
    pub id: String,
    pub name: String,
    pub purity: Purity,
    pub icon_key: String,
    #[serde(default)]
    pub kind: String,
    pub markers: Vec<Marker>,
}

/// One in-world resource node, in game coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    pub purity: Purity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_name: Option<String>,
}

impl Marker {
    /// Last dotted segment of the game path name, used as a short node id.
    pub fn short_id(&self) -> Option<&str> {
        let path = self.path_name.as_deref()?;
        path.rsplit('.').next().filter(|segment| !segment.is_empty())
    }
}

impl ResourceCatalog {
    pub fn resources(&self) -> impl Iterator<Item = &ResourceType> {
        self.categories
            .iter()
            .flat_map(|category| category.subcategories.iter())
            .flat_map(|subcategory| subcategory.resources.iter())
    }

    /// Flat `id -> resource` view in tree order.
    pub fn resource_map(&self) -> IndexMap<&str, &ResourceType> {
        self.resources()
            .map(|resource| (resource.id.as_str(), resource))
            .collect()
    }

    pub fn resource(&self, id: &str) -> Option<&ResourceType> {
        self.resources().find(|resource| resource.id == id)
    }

    pub fn resource_count(&self) -> usize {
        self.resources().count()
    }

    pub fn marker_count(&self) -> usize {
        self.resources().map(|resource| resource.markers.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purity_parse_accepts_game_spellings() {
        assert_eq!(Purity::parse("PURE"), Some(Purity::Pure));
        assert_eq!(Purity::parse(" normal "), Some(Purity::Normal));
        assert_eq!(Purity::parse("RP_Inpure"), Some(Purity::Impure));
        assert_eq!(Purity::parse("rp_pure"), Some(Purity::Pure));
        assert_eq!(Purity::parse("shiny"), None);
    }

    #[test]
    fn purity_from_name_annotation() {
        assert_eq!(
            Purity::from_name_annotation("Iron Ore (Impure)"),
            Some(Purity::Impure)
        );
        assert_eq!(
            Purity::from_name_annotation("Limestone (PURE)"),
            Some(Purity::Pure)
        );
        assert_eq!(Purity::from_name_annotation("Limestone"), None);
    }

    #[test]
    fn raw_tree_tolerates_nulls_and_missing_fields() {
        let raw = RawResourceTree::from_json(
            r#"{"options":[null,{"name":"Resources","options":[{"name":"Ores","options":[null,{"name":"Coal","markers":[{"x":1,"y":2,"pathName":"Persistent_Level.BP_ResourceNode42"}]}]}]}]}"#,
        )
        .expect("parse raw tree");
        assert_eq!(raw.options.len(), 2);
        assert!(raw.options[0].is_none());
        let category = raw.options[1].as_ref().expect("category");
        let subcategory = category.options[0].as_ref().expect("subcategory");
        let resource = subcategory.options[1].as_ref().expect("resource");
        let marker = resource.markers[0].as_ref().expect("marker");
        assert_eq!(marker.x, Some(1.0));
        assert_eq!(marker.z, None);
    }

    const IRON_ORE: &str = r#"{"name":"Iron Ore","markers":[{"x":10,"y":20}]}"#;

    fn ores_tree(resources: &str) -> String {
        format!(r#"{{"options":[{{"name":"Resources","options":[{{"name":"Ores","options":[{resources}]}}]}}]}}"#)
    }

    fn surviving_ids(json: &str) -> Vec<String> {
        let raw = RawResourceTree::from_json(json).expect("malformed nodes are skipped");
        crate::normalize(raw)
            .catalog
            .resources()
            .map(|resource| resource.id.clone())
            .collect()
    }

    #[test]
    fn null_markers_keep_sibling_resources() {
        let json = ores_tree(&format!(r#"{{"name":"Coal","markers":null}},{IRON_ORE}"#));
        assert_eq!(surviving_ids(&json), vec!["coal", "iron_ore"]);

        let raw = RawResourceTree::from_json(&json).expect("parse");
        let ores = raw.options[0].as_ref().and_then(|c| c.options[0].as_ref()).expect("ores");
        assert!(ores.options[0].as_ref().expect("coal").markers.is_empty());
    }

    #[test]
    fn null_or_scalar_options_read_as_empty() {
        let json = format!(
            r#"{{"options":[{{"name":"Broken","options":null}},{{"name":"Odd","options":"x"}},{{"name":"Resources","options":[{{"name":"Ores","options":[{IRON_ORE}]}}]}}]}}"#
        );
        let raw = RawResourceTree::from_json(&json).expect("parse");
        assert!(raw.options[0].as_ref().expect("broken").options.is_empty());
        assert!(raw.options[1].as_ref().expect("odd").options.is_empty());

        let normalized = crate::normalize(raw);
        assert_eq!(normalized.report.categories_emptied, 2);
        assert_eq!(normalized.catalog.resource_count(), 1);
    }

    #[test]
    fn wrong_typed_fields_drop_only_their_node() {
        let json = ores_tree(&format!(
            r#"{{"name":42,"markers":[{{"x":1,"y":1}}]}},{{"name":"Coal","layerId":7,"markers":[{{"x":"1","y":2}},{{"x":3,"y":4,"purity":true}}]}},{IRON_ORE}"#
        ));
        let normalized = crate::normalize(RawResourceTree::from_json(&json).expect("parse"));
        assert_eq!(normalized.report.resources_removed, 1);
        assert_eq!(normalized.report.markers_dropped, 1);

        let coal = normalized.catalog.resource("coal").expect("coal");
        assert_eq!(coal.markers.len(), 1);
        assert_eq!(coal.markers[0].x, 3.0);
        assert!(normalized.catalog.resource("iron_ore").is_some());
    }

    #[test]
    fn non_object_entries_are_skipped() {
        let json = format!(
            r#"{{"options":[1,"Resources",[],{{"name":"Resources","options":[true,{{"name":"Ores","options":[null,"Coal",{IRON_ORE}]}}]}}]}}"#
        );
        let normalized = crate::normalize(RawResourceTree::from_json(&json).expect("parse"));
        assert_eq!(normalized.report.categories_removed, 3);
        assert_eq!(normalized.report.subcategories_removed, 1);
        assert_eq!(normalized.report.resources_removed, 2);
        assert_eq!(surviving_ids(&json), vec!["iron_ore"]);
    }

    #[test]
    fn resource_map_is_flat_and_in_tree_order() {
        let json = format!(
            r#"{{"options":[{{"name":"Resources","options":[{{"name":"Ores","options":[{{"name":"Coal","markers":[{{"x":1,"y":1}}]}},{IRON_ORE}]}},{{"name":"Wells","options":[{{"name":"Crude Oil","markers":[]}}]}}]}},{{"name":"Collectibles","options":[{{"name":"Slugs","options":[{{"name":"Coal","markers":[]}}]}}]}}]}}"#
        );
        let catalog = crate::normalize(RawResourceTree::from_json(&json).expect("parse")).catalog;
        let map = catalog.resource_map();

        assert_eq!(
            map.keys().copied().collect::<Vec<_>>(),
            vec!["coal", "iron_ore", "crude_oil", "coal_2"]
        );
        assert_eq!(map.len(), catalog.resource_count());
        for (id, resource) in &map {
            assert_eq!(*id, resource.id);
            assert_eq!(catalog.resource(id), Some(*resource));
        }
        assert_eq!(map["coal_2"].name, "Coal");
    }

    #[test]
    fn marker_short_id_uses_last_path_segment() {
        let marker = Marker {
            x: 0.0,
            y: 0.0,
            z: None,
            purity: Purity::Normal,
            kind: None,
            path_name: Some("Persistent_Level:PersistentLevel.BP_ResourceNode7".into()),
        };
        assert_eq!(marker.short_id(), Some("BP_ResourceNode7"));
    }
}
