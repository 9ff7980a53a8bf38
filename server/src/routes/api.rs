use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::config::RESOURCES_CACHE_CONTROL;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.snapshot.read().await;
    Json(serde_json::json!({
        "status": "ok",
        "categories": snapshot.catalog.categories.len(),
        "resources": snapshot.catalog.resource_count(),
        "markers": snapshot.catalog.marker_count(),
        "atlas_loaded": snapshot.atlas.is_some(),
        "unresolved_icons": snapshot.unresolved_count(),
        "loaded_at": snapshot.loaded_at.to_rfc3339(),
        "generation": state.generation.load(Ordering::Relaxed),
        "normalize": &snapshot.report,
    }))
}

/// Serve the pre-serialized normalized catalog.
pub async fn get_resources(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let (etag, json): (String, Arc<Bytes>) = {
        let snapshot = state.snapshot.read().await;
        (snapshot.etag.clone(), Arc::clone(&snapshot.catalog_json))
    };

    if if_none_match_matches(&headers, &etag) {
        return not_modified_response(RESOURCES_CACHE_CONTROL, Some(etag.as_str()));
    }

    json_bytes_response((*json).clone(), RESOURCES_CACHE_CONTROL, Some(etag.as_str()))
}

/// Resolver outcome for every resource in the current snapshot.
pub async fn get_debug_icons(State(state): State<AppState>) -> Response {
    let json = Arc::clone(&state.snapshot.read().await.icons_json);
    json_bytes_response((*json).clone(), "no-cache", None)
}

fn json_bytes_response(body: Bytes, cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn not_modified_response(cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.strip_prefix("W/").unwrap_or(candidate).trim()
}

fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };

    raw.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::net::SocketAddr;

    use super::if_none_match_matches;
    use crate::services::catalog_loader::load_snapshot;
    use crate::services::catalog_loader::tests::write_fixture;
    use crate::state::AppState;

    pub(crate) async fn spawn_test_server(
        state: AppState,
    ) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let app = crate::app::build_app(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test app");
        });
        (addr, handle)
    }

    pub(crate) async fn loaded_state(dir: &std::path::Path) -> AppState {
        let paths = write_fixture(dir);
        let state = AppState::new(paths.clone());
        state
            .install(load_snapshot(&paths).await.expect("load fixture"))
            .await;
        state
    }

    #[test]
    fn if_none_match_supports_weak_and_multiple_etags() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            axum::http::header::IF_NONE_MATCH,
            axum::http::HeaderValue::from_static("W/\"other\", \"resources-0000002a\""),
        );
        assert!(if_none_match_matches(&headers, "\"resources-0000002a\""));
        assert!(!if_none_match_matches(&headers, "\"resources-00000000\""));
    }

    #[tokio::test]
    async fn health_exposes_expected_contract() {
        let dir = tempfile::tempdir().expect("temp dir");
        let state = loaded_state(dir.path()).await;
        let (addr, server_handle) = spawn_test_server(state).await;

        let health = reqwest::Client::new()
            .get(format!("http://{addr}/api/health"))
            .send()
            .await
            .expect("health request")
            .error_for_status()
            .expect("health status")
            .json::<serde_json::Value>()
            .await
            .expect("parse health");

        assert_eq!(health.get("status").and_then(|v| v.as_str()), Some("ok"));
        assert_eq!(health.get("resources").and_then(|v| v.as_u64()), Some(2));
        assert_eq!(health.get("markers").and_then(|v| v.as_u64()), Some(3));
        assert_eq!(health.get("generation").and_then(|v| v.as_u64()), Some(1));
        assert_eq!(
            health
                .get("normalize")
                .and_then(|v| v.get("resources_removed"))
                .and_then(|v| v.as_u64()),
            Some(1)
        );

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn resources_endpoint_returns_not_modified_when_etag_matches() {
        let dir = tempfile::tempdir().expect("temp dir");
        let state = loaded_state(dir.path()).await;
        let (addr, server_handle) = spawn_test_server(state).await;
        let url = format!("http://{addr}/api/resources");
        let client = reqwest::Client::new();

        let first = client
            .get(&url)
            .send()
            .await
            .expect("resources request should succeed");
        assert_eq!(first.status(), reqwest::StatusCode::OK);
        let first_etag = first
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .expect("etag header should be present");
        let body = first
            .json::<serde_json::Value>()
            .await
            .expect("parse catalog");
        let iron = &body["categories"][0]["subcategories"][0]["resources"][0];
        assert_eq!(iron["id"], "iron_ore_(normal)");
        assert_eq!(iron["purity"], "Normal");
        assert_eq!(iron["markers"][1]["x"], -50.0);

        let second = client
            .get(&url)
            .header(reqwest::header::IF_NONE_MATCH, first_etag)
            .send()
            .await
            .expect("conditional resources request should succeed");
        assert_eq!(second.status(), reqwest::StatusCode::NOT_MODIFIED);
        assert_eq!(
            second
                .headers()
                .get(reqwest::header::CACHE_CONTROL)
                .and_then(|value| value.to_str().ok()),
            Some("public, max-age=60")
        );

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn debug_icons_lists_strategy_per_resource() {
        let dir = tempfile::tempdir().expect("temp dir");
        let state = loaded_state(dir.path()).await;
        let (addr, server_handle) = spawn_test_server(state).await;

        let report = reqwest::get(format!("http://{addr}/api/debug/icons"))
            .await
            .expect("debug request")
            .json::<serde_json::Value>()
            .await
            .expect("parse debug report");

        assert_eq!(report["columns"], 5);
        assert_eq!(report["outOfBounds"], serde_json::json!(["broken_256"]));
        assert_eq!(report["unresolved"], serde_json::json!(["glowcap"]));
        assert_eq!(report["resources"][0]["strategy"], "sized_icon");
        assert_eq!(report["resources"][0]["position"], serde_json::json!({"x": 1, "y": 0}));
        assert_eq!(report["resources"][1]["strategy"], "default");
        assert_eq!(report["resources"][1]["position"], serde_json::json!({"x": 4, "y": 1}));

        server_handle.abort();
        let _ = server_handle.await;
    }
}
