use nodemap_shared::{AtlasPosition, IconAtlas, Purity, layers::FALLBACK_MARKER_COLOR};
use web_sys::HtmlImageElement;

use crate::config::{ATLAS_IMAGE_URL, FALLBACK_MARKER_PX};

/// Sheet URL from the metadata, or the bundled default.
pub fn atlas_image_url(atlas: &IconAtlas) -> &str {
    let url = atlas.atlas_url.trim();
    if url.is_empty() { ATLAS_IMAGE_URL } else { url }
}

/// Inline CSS showing one atlas cell scaled to `size_px`.
pub fn sprite_style(atlas: &IconAtlas, pos: AtlasPosition, size_px: u32) -> String {
    let (sheet_w, sheet_h) = atlas.sheet_size(size_px);
    let (offset_x, offset_y) = atlas.pixel_offset(pos, size_px);
    format!(
        "display:inline-block;width:{size_px}px;height:{size_px}px;flex-shrink:0;vertical-align:middle;background-image:url('{}');background-repeat:no-repeat;background-size:{sheet_w}px {sheet_h}px;background-position:-{offset_x}px -{offset_y}px;",
        atlas_image_url(atlas),
    )
}

pub fn purity_class(purity: Purity) -> &'static str {
    match purity {
        Purity::Impure => "atlas-icon purity-impure",
        Purity::Normal => "atlas-icon purity-normal",
        Purity::Pure => "atlas-icon purity-pure",
        Purity::Unknown => "atlas-icon",
    }
}

pub fn marker_icon_html(atlas: &IconAtlas, pos: AtlasPosition, size_px: u32) -> String {
    format!("<div style=\"{}\"></div>", sprite_style(atlas, pos, size_px))
}

pub fn fallback_marker_html() -> String {
    format!(
        "<div style=\"width:{FALLBACK_MARKER_PX}px;height:{FALLBACK_MARKER_PX}px;background:{FALLBACK_MARKER_COLOR};border:1px solid #13161f;border-radius:50%;\"></div>"
    )
}

/// Load and decode the atlas sheet so the first marker pass hits the cache.
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
pub async fn preload_atlas_image(url: &str) -> Result<HtmlImageElement, String> {
    let image =
        HtmlImageElement::new().map_err(|e| format!("image element error: {e:?}"))?;
    image.set_src(url);
    wasm_bindgen_futures::JsFuture::from(image.decode())
        .await
        .map_err(|e| format!("decode error: {e:?}"))?;
    Ok(image)
}
