pub mod response;

use std::future::Future;
use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use crate::config::CorsConfig;
use crate::features;
use crate::ingest::RecordStore;
use crate::middleware;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
}

/// Build the application router with all routes and middleware
pub fn create_router(state: AppState, cors: &CorsConfig) -> Router {
    let feature_state = features::FeatureState {
        store: state.store.clone(),
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", features::router(feature_state))
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(cors))
}

/// Serve `app` on `addr` until `shutdown` resolves.
pub async fn serve<F>(addr: &str, app: Router, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "tsvflow",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
