// HTTP handlers for the ride endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::rides::{
    CancelRideRequest, CancelRideResponse, RideError, RideResponse, RideStatus,
    ScheduleRideRequest, ScheduleRideResponse,
};
use crate::store::RideScope;
use crate::AppState;

/// Query parameters for the upcoming-rides listing
#[derive(Debug, Deserialize, IntoParams)]
pub struct UpcomingQuery {
    /// Restrict to one rider; omitted means all riders
    pub rider_id: Option<i32>,
    /// Restrict to one lifecycle status
    pub status: Option<String>,
    pub limit: Option<i64>,
}

/// Handler for POST /api/rides/schedule
///
/// # Arguments
/// * `state` - application state with the ride service
/// * `payload` - booking request
///
/// # Returns
/// The created ride and its payment, or an error response
#[utoipa::path(
    post,
    path = "/api/rides/schedule",
    request_body = ScheduleRideRequest,
    responses(
        (status = 201, description = "Ride booked and prepaid", body = ScheduleRideResponse),
        (status = 400, description = "Invalid booking request"),
        (status = 402, description = "Insufficient wallet balance")
    ),
    tag = "rides"
)]
pub async fn schedule_ride_handler(
    State(state): State<AppState>,
    Json(payload): Json<ScheduleRideRequest>,
) -> Result<(StatusCode, Json<ScheduleRideResponse>), RideError> {
    payload
        .validate()
        .map_err(|e| RideError::ValidationError(e.to_string()))?;

    tracing::debug!(rider_id = payload.rider_id, "Booking scheduled ride");
    let (ride, payment) = state.ride_service.schedule_ride(payload, Utc::now()).await?;

    Ok((
        StatusCode::CREATED,
        Json(ScheduleRideResponse {
            ride: ride.into(),
            payment: payment.into(),
        }),
    ))
}

/// Handler for GET /api/rides/upcoming
#[utoipa::path(
    get,
    path = "/api/rides/upcoming",
    params(UpcomingQuery),
    responses(
        (status = 200, description = "Scheduled rides, soonest first", body = Vec<RideResponse>),
        (status = 400, description = "Invalid status filter")
    ),
    tag = "rides"
)]
pub async fn list_upcoming_handler(
    State(state): State<AppState>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<Vec<RideResponse>>, RideError> {
    let scope = match query.rider_id {
        Some(id) => RideScope::Rider(id),
        None => RideScope::All,
    };
    let status = match &query.status {
        Some(s) => Some(RideStatus::from_str(s).map_err(RideError::ValidationError)?),
        None => None,
    };

    let rides = state
        .ride_service
        .list_upcoming(scope, status, query.limit)
        .await?;
    Ok(Json(rides.into_iter().map(RideResponse::from).collect()))
}

/// Handler for POST /api/rides/{ride_id}/cancel
///
/// # Returns
/// The cancelled ride and the refund issued
#[utoipa::path(
    post,
    path = "/api/rides/{ride_id}/cancel",
    params(("ride_id" = Uuid, Path, description = "Ride to cancel")),
    request_body = CancelRideRequest,
    responses(
        (status = 200, description = "Ride cancelled", body = CancelRideResponse),
        (status = 403, description = "Ride belongs to another rider"),
        (status = 404, description = "Ride not found"),
        (status = 409, description = "Ride is no longer cancellable")
    ),
    tag = "rides"
)]
pub async fn cancel_ride_handler(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
    Json(payload): Json<CancelRideRequest>,
) -> Result<Json<CancelRideResponse>, RideError> {
    payload
        .validate()
        .map_err(|e| RideError::ValidationError(e.to_string()))?;

    let (ride, refund_amount) = state
        .ride_service
        .cancel_scheduled_ride(ride_id, payload, Utc::now())
        .await?;

    Ok(Json(CancelRideResponse {
        ride: ride.into(),
        refund_amount,
    }))
}
