// Booking and cancellation flows for prepaid scheduled rides
//
// Every public method takes `now` from the caller so the time-based rules
// stay deterministic under test. State changes go through the store's
// transactional commits; notifications fire only after a commit succeeded.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::dispatch::matcher::haversine_km;
use crate::notify::Notifier;
use crate::rides::{
    CancelRideRequest, CancelledBy, FareEstimator, Payment, RefundPolicy, RideError, RideRequest,
    RideStatus, ScheduleRideRequest,
};
use crate::store::{CancelRecord, NewBooking, RideScope, RideStore};

/// Tariff applied when a booking names none; seeded by the migrations
pub const DEFAULT_TARIFF_ID: i32 = 1;

/// Hard ceiling on listing page size
const MAX_LIST_LIMIT: i64 = 100;

/// Service layer for scheduled-ride booking, listing and cancellation
pub struct RideService<S> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    /// Minimum minutes between booking time and departure
    min_lead_minutes: i64,
}

impl<S> Clone for RideService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            notifier: self.notifier.clone(),
            min_lead_minutes: self.min_lead_minutes,
        }
    }
}

impl<S: RideStore> RideService<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, min_lead_minutes: i64) -> Self {
        Self {
            store,
            notifier,
            min_lead_minutes,
        }
    }

    /// Book a prepaid scheduled ride
    ///
    /// Estimates the fare from the tariff, route distance and a derived
    /// duration, then persists the ride, its paid payment and the wallet
    /// debit (for wallet payments) in one transaction. Rejects departures
    /// in the past or inside the minimum lead window before touching the
    /// store at all.
    ///
    /// # Arguments
    /// * `req` - validated booking request
    /// * `now` - booking time, the reference for the lead-time check
    ///
    /// # Returns
    /// The created ride with its payment record
    pub async fn schedule_ride(
        &self,
        req: ScheduleRideRequest,
        now: DateTime<Utc>,
    ) -> Result<(RideRequest, Payment), RideError> {
        if req.schedule_at <= now {
            return Err(RideError::ValidationError(
                "Scheduled time must be in the future".to_string(),
            ));
        }
        if req.schedule_at - now < Duration::minutes(self.min_lead_minutes) {
            return Err(RideError::ValidationError(format!(
                "Scheduled rides must be booked at least {} minutes ahead",
                self.min_lead_minutes
            )));
        }

        let tariff_id = req.tariff_id.unwrap_or(DEFAULT_TARIFF_ID);
        let tariff = self
            .store
            .find_tariff(tariff_id)
            .await?
            .ok_or(RideError::TariffNotFound(tariff_id))?;

        let coupon = match &req.coupon_code {
            Some(code) => Some(
                self.store
                    .find_coupon(code)
                    .await?
                    .ok_or_else(|| {
                        RideError::ValidationError(format!("Unknown coupon code: {}", code))
                    })?,
            ),
            None => None,
        };

        let distance_km = haversine_km(
            req.pickup.lat,
            req.pickup.lng,
            req.dropoff.lat,
            req.dropoff.lng,
        );
        let duration_secs = FareEstimator::estimated_duration_secs(distance_km);
        let fare = FareEstimator::estimate(
            &tariff,
            Decimal::from_f64_retain(distance_km)
                .unwrap_or(Decimal::ZERO)
                .round_dp(3),
            duration_secs,
            coupon.as_ref(),
            req.schedule_at,
            Decimal::ZERO,
        );

        let booking = NewBooking {
            rider_id: req.rider_id,
            tariff_id: Some(tariff.id),
            schedule_at: req.schedule_at,
            pickup_lat: req.pickup.lat,
            pickup_lng: req.pickup.lng,
            pickup_address: req.pickup.address.clone(),
            dropoff_lat: req.dropoff.lat,
            dropoff_lng: req.dropoff.lng,
            dropoff_address: req.dropoff.address.clone(),
            fare,
            method: req.payment_method,
            txn_ref: req.payment_ref.clone(),
        };

        let (ride, payment) = self.store.create_booking(booking, now).await?;

        tracing::info!(
            ride_id = %ride.id,
            rider_id = ride.rider_id,
            total = %ride.total_amount,
            "Scheduled ride booked"
        );

        if let Err(err) = self
            .notifier
            .notify(
                ride.rider_id,
                "Ride scheduled",
                &format!("Your ride is booked for {}", ride.schedule_at),
                json!({ "ride_id": ride.id, "total": ride.total_amount }),
            )
            .await
        {
            tracing::warn!(ride_id = %ride.id, "Booking notification failed: {}", err);
        }

        Ok((ride, payment))
    }

    /// List scheduled rides, scoped to one rider or to everyone
    pub async fn list_upcoming(
        &self,
        scope: RideScope,
        status: Option<RideStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<RideRequest>, RideError> {
        let limit = limit.unwrap_or(MAX_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        Ok(self.store.list_upcoming(scope, status, limit).await?)
    }

    /// Cancel a scheduled ride on the rider's behalf
    ///
    /// The refund follows the time-based policy: full more than an hour
    /// before departure, half inside the last hour, nothing at or past the
    /// scheduled time. The store commit re-checks the status, so a ride the
    /// activation pass claimed first comes back as a conflict, never a
    /// double transition.
    pub async fn cancel_scheduled_ride(
        &self,
        ride_id: Uuid,
        req: CancelRideRequest,
        now: DateTime<Utc>,
    ) -> Result<(RideRequest, Decimal), RideError> {
        let ride = self
            .store
            .find_ride(ride_id)
            .await?
            .ok_or(RideError::NotFound)?;

        if ride.rider_id != req.rider_id {
            return Err(RideError::NotOwner);
        }
        if !ride.is_schedule || !ride.is_prepaid {
            return Err(RideError::NotPrepaidScheduled);
        }
        match ride.status {
            RideStatus::Scheduled => {}
            RideStatus::Active => return Err(RideError::ActiveRide),
            RideStatus::Completed => return Err(RideError::AlreadyCompleted),
            RideStatus::Cancelled => return Err(RideError::AlreadyCancelled),
            RideStatus::Expired => {
                return Err(RideError::Conflict("Ride already expired".to_string()))
            }
        }

        let payment = self
            .store
            .find_payment(ride_id)
            .await?
            .ok_or(RideError::NotPrepaidScheduled)?;

        let refund_amount =
            RefundPolicy::refund_amount(ride.status, ride.schedule_at, now, payment.amount);

        let record = CancelRecord {
            ride_id,
            cancelled_by: CancelledBy::Rider,
            reason: req.reason.clone(),
            refund_amount,
        };

        let cancelled = self
            .store
            .cancel_ride(record, now)
            .await?
            .ok_or_else(|| {
                RideError::Conflict("Ride was activated before the cancellation landed".to_string())
            })?;

        tracing::info!(
            ride_id = %cancelled.id,
            refund = %refund_amount,
            "Scheduled ride cancelled"
        );

        if let Err(err) = self
            .notifier
            .notify(
                cancelled.rider_id,
                "Ride cancelled",
                &format!("Refund issued: {}", refund_amount),
                json!({ "ride_id": cancelled.id, "refund": refund_amount }),
            )
            .await
        {
            tracing::warn!(ride_id = %cancelled.id, "Cancellation notification failed: {}", err);
        }

        Ok((cancelled, refund_amount))
    }
}
