use std::path::Path;

use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let paths = state.paths.clone();

    // Unknown paths fall through to the bundle dir, then to the SPA entry point.
    let spa = Router::new()
        .fallback_service(
            ServeDir::new(&paths.dist_dir)
                .precompressed_br()
                .precompressed_gzip()
                .fallback(ServeFile::new(paths.index_html())),
        )
        .layer(middleware::from_fn(set_static_cache_control));

    let static_dirs = Router::new()
        .nest_service("/public", ServeDir::new(&paths.public_dir))
        .nest_service("/assets", ServeDir::new(paths.assets_dir()))
        .nest_service("/dist", ServeDir::new(&paths.dist_dir))
        .layer(middleware::from_fn(set_static_cache_control));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-requested-with"),
        ]);

    let app = Router::new()
        .route(
            "/api/resources",
            axum::routing::get(routes::api::get_resources),
        )
        .route(
            "/api/debug/icons",
            axum::routing::get(routes::api::get_debug_icons),
        )
        .route("/api/health", axum::routing::get(routes::api::health))
        .merge(static_dirs);

    app.layer(CompressionLayer::new())
        .fallback_service(spa)
        .layer(cors)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let response = next.run(request).await;
    info!(%method, %path, status = response.status().as_u16(), "request");
    response
}

async fn set_static_cache_control(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;

    if response.status().is_success()
        && let Some(cache_control) = cache_control_for_path(&path)
    {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(cache_control),
        );
    }

    response
}

fn cache_control_for_path(path: &str) -> Option<&'static str> {
    if is_hashed_bundle_asset(path) {
        return Some("public, max-age=31536000, immutable");
    }

    let ext = Path::new(path).extension().and_then(|ext| ext.to_str())?;
    let in_assets = path.starts_with("/assets/") || path.starts_with("/public/assets/");
    if in_assets && matches!(ext, "png" | "webp" | "svg" | "jpg") {
        return Some("public, max-age=86400");
    }

    None
}

fn is_hashed_bundle_asset(path: &str) -> bool {
    let Some(ext) = Path::new(path).extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    if !matches!(ext, "wasm" | "js" | "css") {
        return false;
    }

    let Some(filename) = Path::new(path).file_name().and_then(|name| name.to_str()) else {
        return false;
    };

    filename
        .split(['-', '_', '.'])
        .any(|segment| segment.len() >= 8 && segment.chars().all(|c| c.is_ascii_hexdigit()))
}
