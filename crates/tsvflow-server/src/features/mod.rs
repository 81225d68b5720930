//! Feature modules implementing the HTTP API
//!
//! Each feature is a vertical slice with its own `queries/` and `routes.rs`.
//!
//! - **records**: grouped retrieval of ingested records by unit identifier

pub mod records;

use std::sync::Arc;

use axum::Router;

use crate::ingest::RecordStore;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub store: Arc<dyn RecordStore>,
}

/// Creates the API router with all feature routes mounted
///
/// - `/records` - record retrieval
pub fn router(state: FeatureState) -> Router {
    Router::new()
        .nest("/records", records::records_routes())
        .with_state(state)
}
