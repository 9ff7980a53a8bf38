use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::tree::{
    Category, Marker, Purity, RawCategory, RawMarker, RawResourceTree, RawResourceType,
    RawSubcategory, ResourceCatalog, ResourceType, Subcategory,
};

/// Icon key used when a resource name standardizes to nothing.
pub const DEFAULT_ICON_KEY: &str = "limestone";

/// Canonical display-name -> icon-key table. Keys are purity-stripped,
/// lowercased names.
const ICON_KEY_ALIASES: &[(&str, &str)] = &[
    // Ores
    ("iron ore", "iron"),
    ("copper ore", "copper"),
    ("limestone", "limestone"),
    ("coal", "coal"),
    ("caterium ore", "caterium"),
    ("bauxite", "bauxite"),
    ("sulfur", "sulfur"),
    ("uranium", "uranium"),
    ("sam ore", "sam_ore"),
    ("s.a.m. ore", "sam_ore"),
    ("raw quartz", "quartz"),
    // Liquids and gases
    ("crude oil", "oil"),
    ("water", "water"),
    ("nitrogen gas", "nitrogen_gas"),
    ("geyser", "geyser"),
    // Collectibles
    ("power slug", "slug_green"),
    ("green power slug", "slug_green"),
    ("blue power slug", "slug_green"),
    ("yellow power slug", "slug_yellow"),
    ("purple power slug", "slug_purple"),
    ("hard drive", "hard_drive"),
    ("somers loop", "somers_loop"),
    ("somersloop", "somers_loop"),
    ("mercer sphere", "mercer_sphere"),
    // Flora. Spore flowers share the paleberry icon.
    ("beryl nut", "beryl_nut"),
    ("paleberry", "paleberry"),
    ("bacon agaric", "bacon_agaric"),
    ("spore flower", "paleberry"),
];

/// Raw `type` substring rules, tried in order after the alias table.
const KIND_RULES: &[(&[&str], &str)] = &[
    (&["slug", "green"], "slug_green"),
    (&["slug", "purple"], "slug_purple"),
    (&["slug", "yellow"], "slug_yellow"),
    (&["hard", "drive"], "hard_drive"),
    (&["sphere"], "mercer_sphere"),
    (&["loop"], "somers_loop"),
];

/// A name is valid when present, non-empty and free of placeholder words.
pub fn is_valid_name(name: Option<&str>) -> bool {
    let Some(name) = name else {
        return false;
    };
    if name.trim().is_empty() {
        return false;
    }
    let lower = name.to_lowercase();
    !lower.contains("unknown") && !lower.contains("undefined")
}

/// Lowercase and collapse whitespace runs into single underscores.
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Remove parenthesized purity annotations and lowercase the remainder.
pub fn strip_purity_annotation(name: &str) -> String {
    let mut out = name.to_lowercase();
    for tag in Purity::annotation_tags() {
        while let Some(start) = out.find(tag) {
            let head = out[..start].trim_end();
            let tail = out[start + tag.len()..].trim_start();
            out = match (head.is_empty(), tail.is_empty()) {
                (false, false) => format!("{head} {tail}"),
                _ => format!("{head}{tail}"),
            };
        }
    }
    out.trim().to_string()
}

/// Standardized icon key for a resource name and optional raw type string.
///
/// Fixed priority: alias table on the purity-stripped name, then raw type
/// substrings, then the stripped name itself with whitespace as underscores.
pub fn standardize_icon_key(name: &str, kind: Option<&str>) -> String {
    let base = strip_purity_annotation(name);

    if let Some((_, key)) = ICON_KEY_ALIASES.iter().find(|(alias, _)| *alias == base) {
        return (*key).to_string();
    }

    if let Some(kind) = kind {
        let kind = kind.to_lowercase();
        let rule = KIND_RULES
            .iter()
            .find(|(needles, _)| needles.iter().all(|needle| kind.contains(needle)));
        if let Some((_, key)) = rule {
            return (*key).to_string();
        }
    }

    let key = slugify(&base);
    if key.is_empty() {
        DEFAULT_ICON_KEY.to_string()
    } else {
        key
    }
}

/// Removal counts for one subcategory that passed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubcategoryReport {
    pub category: String,
    pub subcategory: String,
    pub kept: usize,
    pub removed: usize,
}

/// Diagnostic counts gathered while normalizing. Not a correctness contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub categories_removed: usize,
    pub categories_emptied: usize,
    pub subcategories_removed: usize,
    pub subcategories_emptied: usize,
    pub resources_removed: usize,
    pub markers_dropped: usize,
    pub duplicate_ids: usize,
    pub subcategories: Vec<SubcategoryReport>,
}

impl NormalizeReport {
    /// Invalid nodes dropped together with their subtrees, across all levels.
    pub fn total_removed(&self) -> usize {
        self.categories_removed + self.subcategories_removed + self.resources_removed
    }

    pub fn subcategory(&self, category: &str, subcategory: &str) -> Option<&SubcategoryReport> {
        self.subcategories
            .iter()
            .find(|report| report.category == category && report.subcategory == subcategory)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub catalog: ResourceCatalog,
    pub report: NormalizeReport,
}

/// Filter invalid nodes out of the raw tree, assign stable ids and icon keys.
pub fn normalize(raw: RawResourceTree) -> Normalized {
    let mut normalizer = Normalizer::default();
    let total = raw.options.len();
    let mut categories = Vec::new();

    for category in raw.options {
        let Some(category) = category.filter(|c| is_valid_name(c.name.as_deref())) else {
            normalizer.report.categories_removed += 1;
            continue;
        };
        match normalizer.category(category) {
            Some(category) => categories.push(category),
            None => normalizer.report.categories_emptied += 1,
        }
    }

    let report = normalizer.report;
    info!(
        kept = categories.len(),
        removed = total - categories.len(),
        invalid_entries = report.total_removed(),
        markers_dropped = report.markers_dropped,
        duplicate_ids = report.duplicate_ids,
        "normalized resource tree"
    );

    Normalized {
        catalog: ResourceCatalog { categories },
        report,
    }
}

#[derive(Default)]
struct Normalizer {
    report: NormalizeReport,
    seen_ids: HashSet<String>,
}

impl Normalizer {
    fn category(&mut self, raw: RawCategory) -> Option<Category> {
        let name = raw.name.unwrap_or_default();
        let total = raw.options.len();
        let mut subcategories = Vec::new();

        for subcategory in raw.options {
            let Some(subcategory) = subcategory.filter(|s| is_valid_name(s.name.as_deref())) else {
                self.report.subcategories_removed += 1;
                continue;
            };
            match self.subcategory(&name, subcategory) {
                Some(subcategory) => subcategories.push(subcategory),
                None => self.report.subcategories_emptied += 1,
            }
        }

        debug!(
            category = %name,
            kept = subcategories.len(),
            removed = total - subcategories.len(),
            "processed category"
        );

        if subcategories.is_empty() {
            return None;
        }
        let id = raw
            .tab_id
            .filter(|tab_id| !tab_id.trim().is_empty())
            .unwrap_or_else(|| slugify(&name));
        Some(Category {
            id,
            name,
            subcategories,
        })
    }

    fn subcategory(&mut self, category: &str, raw: RawSubcategory) -> Option<Subcategory> {
        let name = raw.name.unwrap_or_default();
        let mut resources = Vec::new();
        let mut removed = 0;

        for resource in raw.options {
            let Some(resource) = resource.filter(|r| is_valid_name(r.name.as_deref())) else {
                removed += 1;
                continue;
            };
            resources.push(self.resource(resource));
        }

        self.report.resources_removed += removed;
        self.report.subcategories.push(SubcategoryReport {
            category: category.to_string(),
            subcategory: name.clone(),
            kept: resources.len(),
            removed,
        });
        debug!(
            subcategory = %name,
            kept = resources.len(),
            removed,
            "processed subcategory"
        );

        if resources.is_empty() {
            return None;
        }
        Some(Subcategory {
            id: slugify(&name),
            name,
            kind: raw.kind.unwrap_or_default(),
            resources,
        })
    }

    fn resource(&mut self, raw: RawResourceType) -> ResourceType {
        let name = raw.name.unwrap_or_default();
        let id = self.unique_id(
            raw.layer_id
                .filter(|layer_id| !layer_id.trim().is_empty())
                .unwrap_or_else(|| slugify(&name)),
        );
        let kind = raw.kind.unwrap_or_default();
        let icon_key = standardize_icon_key(&name, Some(kind.as_str()).filter(|k| !k.is_empty()));
        let purity = raw
            .purity
            .as_deref()
            .and_then(Purity::parse)
            .or_else(|| Purity::from_name_annotation(&name))
            .unwrap_or_default();

        let mut markers = Vec::with_capacity(raw.markers.len());
        for marker in raw.markers {
            match marker.and_then(|m| convert_marker(m, purity)) {
                Some(marker) => markers.push(marker),
                None => self.report.markers_dropped += 1,
            }
        }

        ResourceType {
            id,
            name,
            purity,
            icon_key,
            kind,
            markers,
        }
    }

    fn unique_id(&mut self, candidate: String) -> String {
        if self.seen_ids.insert(candidate.clone()) {
            return candidate;
        }
        self.report.duplicate_ids += 1;
        let mut suffix = 2usize;
        loop {
            let id = format!("{candidate}_{suffix}");
            if self.seen_ids.insert(id.clone()) {
                return id;
            }
            suffix += 1;
        }
    }
}

fn convert_marker(raw: RawMarker, parent_purity: Purity) -> Option<Marker> {
    let x = raw.x.filter(|v| v.is_finite())?;
    let y = raw.y.filter(|v| v.is_finite())?;
    let purity = raw
        .purity
        .as_deref()
        .and_then(Purity::parse)
        .unwrap_or(parent_purity);
    Some(Marker {
        x,
        y,
        z: raw.z.filter(|v| v.is_finite()),
        purity,
        kind: raw.kind.filter(|kind| !kind.trim().is_empty()),
        path_name: raw.path_name,
    })
}
