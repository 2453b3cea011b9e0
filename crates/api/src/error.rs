//! API error type and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reading_validator::ValidationError;
use serde::{Deserialize, Serialize};
use storage::StorageError;
use thiserror::Error;

/// Body of every error response
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request input
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No readings recorded for the requested zip.
    /// Answered with 400, not 404; clients rely on it.
    #[error("Zip does not exist in the database.")]
    ZipNotFound,

    /// No route or static file matched
    #[error("Not Found")]
    NotFound,

    /// Storage unreachable or query failed
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    /// Invalid server configuration detected while building the router
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::ZipNotFound => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Storage(_) | ApiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to callers
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Storage(_) | ApiError::Config(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Storage(_) | ApiError::Config(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorBody {
            error: self.user_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
