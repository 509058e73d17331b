use crate::error::ScraperError;
use crate::extract::Strategy;
use crate::pipeline::run_sync;
use crate::storage::SnapshotStore;
use crate::types::Snapshot;
use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::error;

/// Everything a request handler needs, fixed at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SnapshotStore>,
    pub upstream_url: String,
    pub strategy: Strategy,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "theatre-scraper",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Serves the current snapshot, or the empty snapshot if no sync has run
/// yet. A missing record is a valid empty state, always HTTP 200.
async fn get_events(Extension(state): Extension<AppState>) -> impl IntoResponse {
    match state.store.load().await {
        Ok(Some(snapshot)) => Json(snapshot).into_response(),
        Ok(None) => Json(Snapshot::empty()).into_response(),
        Err(e) => {
            error!("Snapshot read failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"ok": false, "error": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// Runs the full sync pipeline and reports only the resulting count; the
/// client re-reads `/api/events` for the data itself.
async fn sync_events(Extension(state): Extension<AppState>) -> impl IntoResponse {
    match run_sync(state.store.clone(), &state.upstream_url, state.strategy).await {
        Ok(snapshot) => {
            Json(serde_json::json!({"ok": true, "count": snapshot.count})).into_response()
        }
        Err(e) => {
            let status = match &e {
                ScraperError::Http(_) | ScraperError::Upstream(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error!("Sync failed: {}", e);
            (
                status,
                Json(serde_json::json!({"ok": false, "error": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// Create the HTTP server with all routes
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        // Static page shell
        .nest_service("/assets", ServeDir::new("assets"))
        .route("/api/events", get(get_events))
        // Sync is a POST in the client, but GET is tolerated for manual
        // triggering from a browser address bar.
        .route("/api/sync-events", post(sync_events).get(sync_events))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_server(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("🎭 Events:       http://localhost:{port}/api/events");
    println!("🔄 Sync:         http://localhost:{port}/api/sync-events");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
