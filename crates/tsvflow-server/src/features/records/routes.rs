//! Record query routes
//!
//! - `GET /api/v1/records?unit_guid=..&page=..&limit=..` - records of one
//!   unit, starting at offset `page`, grouped `limit` at a time

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use super::queries::{ListRecordsError, ListRecordsQuery};
use crate::api::response::ApiResponse;
use crate::error::{ApiResult, AppError};
use crate::features::FeatureState;

// ============================================================================
// Router Configuration
// ============================================================================

pub fn records_routes() -> Router<FeatureState> {
    Router::new().route("/", get(list_records))
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

/// List the records of one unit in groups
///
/// # Response
///
/// - `200 OK` - `data` holds the groups, `meta` the pagination
/// - `400 Bad Request` - missing `unit_guid` or zero `limit`
/// - `404 Not Found` - no records stored for the unit
/// - `500 Internal Server Error` - store failure
#[tracing::instrument(skip(state))]
async fn list_records(
    State(state): State<FeatureState>,
    Query(query): Query<ListRecordsQuery>,
) -> ApiResult<Response> {
    let response = super::queries::list::handle(state.store.as_ref(), query).await?;

    tracing::debug!(
        total = response.pagination.total,
        groups = response.groups.len(),
        "Records listed via API"
    );

    let meta = serde_json::to_value(response.pagination)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(ApiResponse::success_with_meta(response.groups, meta).into_response())
}

impl From<ListRecordsError> for AppError {
    fn from(err: ListRecordsError) -> Self {
        match err {
            ListRecordsError::UnitGuidRequired | ListRecordsError::InvalidLimit => {
                AppError::Validation(err.to_string())
            },
            ListRecordsError::NotFound(_) => AppError::NotFound(err.to_string()),
            ListRecordsError::Store(e) => AppError::Store(e),
        }
    }
}
