//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::ingest::StoreError;

/// Errors returned by HTTP handlers
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            AppError::Validation(message) => ("VALIDATION_ERROR", message),
            AppError::NotFound(message) => ("NOT_FOUND", message),
            AppError::Store(ref e) => {
                tracing::error!(error = %e, "Store error");
                ("INTERNAL_ERROR", "A database error occurred".to_string())
            },
            AppError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                ("INTERNAL_ERROR", "An internal error occurred".to_string())
            },
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

/// Alias for Result with AppError
pub type ApiResult<T> = Result<T, AppError>;
