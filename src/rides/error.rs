use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;

use crate::store::StoreError;

/// Error types for ride operations
#[derive(Debug, thiserror::Error)]
pub enum RideError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Ride not found")]
    NotFound,

    #[error("Tariff not found: {0}")]
    TariffNotFound(i32),

    #[error("Ride does not belong to the requesting rider")]
    NotOwner,

    #[error("Not a prepaid scheduled ride")]
    NotPrepaidScheduled,

    #[error("Ride is already completed")]
    AlreadyCompleted,

    #[error("Ride is already cancelled")]
    AlreadyCancelled,

    #[error("Ride is active; cancellation after activation uses a different flow")]
    ActiveRide,

    #[error("Ride was processed concurrently: {0}")]
    Conflict(String),

    #[error("Insufficient wallet balance: have {balance}, need {required}")]
    InsufficientBalance { balance: Decimal, required: Decimal },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<StoreError> for RideError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(msg) => RideError::DatabaseError(msg),
            StoreError::NotFound(resource) => {
                RideError::DatabaseError(format!("{} disappeared mid-operation", resource))
            }
            StoreError::InsufficientBalance { balance, required } => {
                RideError::InsufficientBalance { balance, required }
            }
        }
    }
}

impl IntoResponse for RideError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            RideError::DatabaseError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            RideError::NotFound => (StatusCode::NOT_FOUND, "Ride not found".to_string()),
            RideError::TariffNotFound(id) => (
                StatusCode::BAD_REQUEST,
                format!("Tariff with id {} not found", id),
            ),
            RideError::NotOwner => (
                StatusCode::FORBIDDEN,
                "Ride does not belong to the requesting rider".to_string(),
            ),
            RideError::NotPrepaidScheduled => (
                StatusCode::CONFLICT,
                "Not a prepaid scheduled ride".to_string(),
            ),
            RideError::AlreadyCompleted => (
                StatusCode::CONFLICT,
                "Ride is already completed".to_string(),
            ),
            RideError::AlreadyCancelled => (
                StatusCode::CONFLICT,
                "Ride is already cancelled".to_string(),
            ),
            RideError::ActiveRide => (
                StatusCode::CONFLICT,
                "Ride is active; cancellation after activation uses a different flow".to_string(),
            ),
            RideError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            RideError::InsufficientBalance { balance, required } => (
                StatusCode::PAYMENT_REQUIRED,
                format!(
                    "Insufficient wallet balance: have {}, need {}",
                    balance, required
                ),
            ),
            RideError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
