use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use leptos::prelude::*;
use nodemap_shared::filters::share_url;
use nodemap_shared::{FilterCommand, ResourceType, resolve};
use wasm_bindgen::{JsCast, JsValue};

use crate::app::{DebugLines, DebugOpen, Filters, Loaded, Session, SidebarOpen, dispatch};
use crate::config::SIDEBAR_ICON_PX;
use crate::icons::sprite_style;

const SHARE_LABEL: &str = "Share Filters";
const SHARE_FEEDBACK_MS: u32 = 2000;

/// Case-insensitive substring match on the display name. An empty query
/// matches everything.
pub(crate) fn matches_search(name: &str, query: &str) -> bool {
    let query = query.trim();
    query.is_empty() || name.to_lowercase().contains(&query.to_lowercase())
}

pub(crate) fn row_label(resource: &ResourceType) -> String {
    match resource.markers.len() {
        0 => resource.name.clone(),
        n => format!("{} ({n})", resource.name),
    }
}

pub(crate) fn toggle_all_label(all_visible: bool) -> &'static str {
    if all_visible {
        "Hide All Nodes"
    } else {
        "Show All Nodes"
    }
}

fn input_value(e: &leptos::ev::Event) -> Option<String> {
    let input = e
        .target()?
        .dyn_into::<web_sys::HtmlInputElement>()
        .ok()?;
    Some(input.value())
}

fn input_checked(e: &leptos::ev::Event) -> Option<bool> {
    let input = e
        .target()?
        .dyn_into::<web_sys::HtmlInputElement>()
        .ok()?;
    Some(input.checked())
}

/// Current page URL with the filter query swapped in. Also rewrites the
/// address bar so a reload keeps the filters.
fn current_share_url(query: &str) -> Result<String, String> {
    let window = web_sys::window().ok_or("no window")?;
    let href = window
        .location()
        .href()
        .map_err(|e| format!("location error: {e:?}"))?;
    let url = share_url(&href, query);
    if let Ok(history) = window.history() {
        history
            .replace_state_with_url(&JsValue::NULL, "", Some(&url))
            .ok();
    }
    Ok(url)
}

async fn copy_to_clipboard(text: &str) -> Result<(), String> {
    let window = web_sys::window().ok_or("no window")?;
    let promise = window.navigator().clipboard().write_text(text);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map(|_| ())
        .map_err(|e| format!("clipboard error: {e:?}"))
}

#[component]
pub fn Sidebar() -> impl IntoView {
    let SidebarOpen(sidebar_open) = expect_context();
    let DebugOpen(debug_open) = expect_context();
    let Loaded(loaded) = expect_context();
    let search_query: RwSignal<String> = RwSignal::new(String::new());
    let active_tab: RwSignal<usize> = RwSignal::new(0);

    view! {
        <div style="position: relative; height: 100%; display: flex;">
            <button
                title=move || if sidebar_open.get() { "Hide sidebar" } else { "Show sidebar" }
                style="position: absolute; top: 16px; left: -40px; z-index: 1001; width: 32px; height: 32px; background: #13161f; border: 1px solid #282c3e; border-radius: 6px; cursor: pointer; color: #9a9590; font-family: 'JetBrains Mono', monospace; font-size: 1rem; line-height: 1;"
                on:click=move |_| sidebar_open.update(|open| *open = !*open)
            >
                {move || if sidebar_open.get() { ">" } else { "<" }}
            </button>
            <div
                style="width: 320px; height: 100%; background: #13161f; border-left: 1px solid #282c3e; flex-direction: column; box-shadow: -4px 0 20px rgba(0,0,0,0.4);"
                style:display=move || if sidebar_open.get() { "flex" } else { "none" }
            >
                <div style="padding: 14px 16px 10px; border-bottom: 1px solid #282c3e;">
                    <div style="font-size: 1rem; font-weight: 700; color: #e2e0d8; font-family: 'Inter', system-ui, sans-serif; margin-bottom: 10px;">
                        "Resource Nodes"
                    </div>
                    <input
                        type="text"
                        placeholder="Search resources..."
                        style="width: 100%; box-sizing: border-box; padding: 8px 12px; background: #1a1d2a; border: 1px solid #282c3e; border-radius: 6px; color: #e2e0d8; font-family: 'Inter', system-ui, sans-serif; font-size: 0.85rem; outline: none;"
                        prop:value=move || search_query.get()
                        on:input=move |e| {
                            if let Some(value) = input_value(&e) {
                                search_query.set(value);
                            }
                        }
                    />
                    <FilterActions />
                </div>
                {move || match loaded.get() {
                    Some(_) => view! {
                        <CategoryTabs active_tab=active_tab />
                        <ResourceList active_tab=active_tab search_query=search_query />
                    }.into_any(),
                    None => view! {
                        <div style="padding: 16px; color: #5a5860; font-family: 'Inter', system-ui, sans-serif; font-size: 0.8rem;">
                            "Loading resources..."
                        </div>
                    }.into_any(),
                }}
                {move || debug_open.get().then(|| view! { <DebugPanel /> })}
            </div>
        </div>
    }
}

#[component]
fn FilterActions() -> impl IntoView {
    let session: Session = expect_context();
    let filters: Filters = expect_context();
    let DebugOpen(debug_open) = expect_context();
    let DebugLines(debug_lines) = expect_context();
    let share_label: RwSignal<&'static str> = RwSignal::new(SHARE_LABEL);
    let share_reset = Rc::new(RefCell::new(None::<Timeout>));

    let all_visible = Memo::new(move |_| filters.0.with(|f| f.all_nodes_visible()));

    let on_toggle_all = move |_| {
        let command = filters.0.with_untracked(|f| f.toggle_all_command());
        dispatch(session, filters, command);
    };

    let on_share = move |_| {
        let query = filters.0.with_untracked(|f| f.share_query());
        let url = match current_share_url(&query) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "could not build share url");
                return;
            }
        };
        let share_reset = Rc::clone(&share_reset);
        wasm_bindgen_futures::spawn_local(async move {
            match copy_to_clipboard(&url).await {
                Ok(()) => share_label.set("URL Copied!"),
                Err(e) => {
                    tracing::warn!(error = %e, "could not copy share url");
                    debug_lines.update(|log| log.error(format!("Could not copy URL: {url}")));
                    share_label.set("Copy failed");
                }
            }
            let timeout = Timeout::new(SHARE_FEEDBACK_MS, move || share_label.set(SHARE_LABEL));
            if let Some(previous) = share_reset.borrow_mut().replace(timeout) {
                previous.cancel();
            }
        });
    };

    let button_style = "flex: 1; padding: 6px 8px; background: #1a1d2a; border: 1px solid #282c3e; border-radius: 4px; color: #e2e0d8; cursor: pointer; font-family: 'Inter', system-ui, sans-serif; font-size: 0.72rem;";

    view! {
        <div style="display: flex; gap: 6px; margin-top: 10px;">
            <button style=button_style on:click=on_toggle_all>
                {move || toggle_all_label(all_visible.get())}
            </button>
            <button style=button_style on:click=on_share>
                {move || share_label.get()}
            </button>
            <button style=button_style on:click=move |_| debug_open.update(|open| *open = !*open)>
                {move || if debug_open.get() { "Hide Debug" } else { "Debug Icons" }}
            </button>
        </div>
    }
}

#[component]
fn CategoryTabs(active_tab: RwSignal<usize>) -> impl IntoView {
    let Loaded(loaded) = expect_context();

    let names: Vec<String> = loaded.with_untracked(|data| {
        data.as_ref()
            .map(|data| data.catalog.categories.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    });

    view! {
        <div style="display: flex; gap: 4px; padding: 8px 16px; border-bottom: 1px solid #282c3e; flex-wrap: wrap;">
            {names.into_iter().enumerate().map(|(idx, name)| {
                view! {
                    <button
                        style=move || {
                            let active = active_tab.get() == idx;
                            format!(
                                "padding: 4px 10px; border-radius: 4px; cursor: pointer; font-family: 'Inter', system-ui, sans-serif; font-size: 0.75rem; border: 1px solid {}; background: {}; color: {};",
                                if active { "rgba(245,197,66,0.4)" } else { "#282c3e" },
                                if active { "#1a1d2a" } else { "transparent" },
                                if active { "#f5c542" } else { "#9a9590" },
                            )
                        }
                        on:click=move |_| active_tab.set(idx)
                    >
                        {name}
                    </button>
                }
            }).collect_view()}
        </div>
    }
}

#[component]
fn ResourceList(active_tab: RwSignal<usize>, search_query: RwSignal<String>) -> impl IntoView {
    let Loaded(loaded) = expect_context();

    view! {
        <div class="scrollbar-thin" style="flex: 1; overflow-y: auto; padding: 4px 0 12px;">
            {move || {
                let Some(data) = loaded.get() else {
                    return ().into_any();
                };
                let Some(category) = data.catalog.categories.get(active_tab.get()).cloned() else {
                    return ().into_any();
                };
                category.subcategories.into_iter().map(|subcategory| {
                    let rows = subcategory.resources.into_iter().map(|resource| {
                        let sprite = resolve(&data.atlas, &resource.icon_key);
                        let icon_style = sprite_style(&data.atlas, sprite, SIDEBAR_ICON_PX);
                        view! { <ResourceRow resource=resource icon_style=icon_style search_query=search_query /> }
                    }).collect_view();
                    view! {
                        <div style="padding: 6px 16px 0;">
                            <h3 style="margin: 8px 0 4px; font-size: 0.7rem; letter-spacing: 0.06em; text-transform: uppercase; color: #5a5860; font-family: 'Inter', system-ui, sans-serif;">
                                {subcategory.name}
                            </h3>
                            {rows}
                        </div>
                    }
                }).collect_view().into_any()
            }}
        </div>
    }
}

#[component]
fn ResourceRow(
    resource: ResourceType,
    icon_style: String,
    search_query: RwSignal<String>,
) -> impl IntoView {
    let session: Session = expect_context();
    let filters: Filters = expect_context();
    let label = row_label(&resource);
    let name = resource.name;
    let id = resource.id;

    let checked = {
        let id = id.clone();
        move || filters.0.with(|f| f.is_visible(&id))
    };
    let on_change = {
        let id = id.clone();
        move |e: leptos::ev::Event| {
            let Some(visible) = input_checked(&e) else {
                return;
            };
            dispatch(
                session,
                filters,
                FilterCommand::SetVisible {
                    id: id.clone(),
                    visible,
                },
            );
        }
    };

    view! {
        <label
            data-resource-id=id
            style="display: flex; align-items: center; gap: 8px; padding: 5px 4px; border-radius: 4px; cursor: pointer; color: #e2e0d8; font-family: 'Inter', system-ui, sans-serif; font-size: 0.82rem;"
            style:display=move || if search_query.with(|q| matches_search(&name, q)) { "flex" } else { "none" }
        >
            <input type="checkbox" style="accent-color: #f5c542; margin: 0;" prop:checked=checked on:change=on_change />
            <span style=icon_style />
            <span>{label}</span>
        </label>
    }
}

#[component]
fn DebugPanel() -> impl IntoView {
    let DebugLines(debug_lines) = expect_context();

    view! {
        <div
            id="icon-debug"
            class="scrollbar-thin"
            style="max-height: 180px; overflow-y: auto; border-top: 1px solid #282c3e; padding: 8px 16px; background: #0c0e17; font-family: 'JetBrains Mono', monospace; font-size: 0.66rem;"
        >
            {move || debug_lines.with(|log| {
                log.lines()
                    .map(|line| {
                        let style = format!("margin: 0 0 2px; color: {};", line.severity.color());
                        let text = line.text.clone();
                        view! { <p style=style>{text}</p> }
                    })
                    .collect_view()
            })}
        </div>
    }
}

#[cfg(test)]
mod tests {
    use nodemap_shared::{Marker, Purity};

    use super::*;

    fn resource(name: &str, markers: usize) -> ResourceType {
        let marker = Marker {
            x: 0.0,
            y: 0.0,
            z: None,
            purity: Purity::Normal,
            kind: None,
            path_name: None,
        };
        ResourceType {
            id: name.to_lowercase().replace(' ', "_"),
            name: name.into(),
            purity: Purity::Normal,
            icon_key: "iron".into(),
            kind: "resource".into(),
            markers: vec![marker; markers],
        }
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        assert!(matches_search("Iron Ore (Normal)", "ore"));
        assert!(matches_search("Iron Ore (Normal)", "  IRON "));
        assert!(matches_search("Crude Oil", ""));
        assert!(!matches_search("Crude Oil", "coal"));
    }

    #[test]
    fn row_label_shows_marker_count() {
        assert_eq!(row_label(&resource("Iron Ore", 3)), "Iron Ore (3)");
        assert_eq!(row_label(&resource("Crude Oil", 0)), "Crude Oil");
    }

    #[test]
    fn toggle_all_label_follows_state() {
        assert_eq!(toggle_all_label(true), "Hide All Nodes");
        assert_eq!(toggle_all_label(false), "Show All Nodes");
    }
}
