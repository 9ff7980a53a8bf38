mod app;
mod config;
mod routes;
mod services;
mod state;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::config::ServerPaths;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let paths = ServerPaths::from_env();
    tracing::info!(
        resources = %paths.resources.display(),
        atlas = %paths.atlas.display(),
        "Loading resource data..."
    );
    let snapshot = match services::catalog_loader::load_snapshot(&paths).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!(error = %e, "failed to load resource data");
            return;
        }
    };
    if !paths.index_html().is_file() {
        tracing::warn!(
            path = %paths.index_html().display(),
            "client bundle not found; build the client before opening the map"
        );
    }

    let state = AppState::new(paths);
    state.install(snapshot).await;

    if let Some(period) = config::reload_interval() {
        tracing::info!(period_secs = period.as_secs(), "hot reload enabled");
        tokio::spawn(services::catalog_loader::run(state.clone(), period));
    }

    let app = app::build_app(state);

    let addr = format!("0.0.0.0:{}", config::server_port());
    tracing::info!("Resource map server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    tracing::info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
