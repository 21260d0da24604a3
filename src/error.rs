// Shared error type for endpoints outside the ride domain
// Ride operations carry their own richer error enum in rides::error

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error};

use crate::store::StoreError;

/// Error type for non-ride endpoints (wallet reads, health)
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found by ID
    /// Maps to HTTP 404 Not Found
    NotFound { resource: String, id: String },

    /// Database operation errors
    /// Maps to HTTP 500 Internal Server Error
    /// Sensitive details are filtered from client responses
    DatabaseError(String),
}

/// Consistent error response structure shared by all handlers
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g. "NOT_FOUND")
    pub error_code: String,
    /// Human-readable error message
    pub message: String,
    /// ISO 8601 timestamp of when the error occurred
    pub timestamp: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} with id {}", resource, id);
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse {
                        error_code: "NOT_FOUND".to_string(),
                        message: format!("{} with id {} not found", resource, id),
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::DatabaseError(db_error) => {
                // Log the full database error internally; clients get a generic message
                error!("Database error: {}", db_error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error_code: "DATABASE_ERROR".to_string(),
                        message: "A database error occurred".to_string(),
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(resource) => ApiError::NotFound {
                resource: resource.to_string(),
                id: "?".to_string(),
            },
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}
