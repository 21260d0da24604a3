// Lifecycle commit and batch activation pass
//
// The per-ride commit is the concurrency-critical step: the store re-reads
// the ride inside a serializable transaction, so this layer only decides
// between assignment, expiry and retry, and fires best-effort notifications
// strictly after the transaction has durably committed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::dispatch::matcher;
use crate::notify::{EventRoom, Notifier};
use crate::rides::RideRequest;
use crate::store::{CommitOutcome, RideStore, StoreError};

/// Tunable dispatch behaviour; the grace window is policy, not law
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Maximum due rides handled per pass
    pub batch_size: i64,
    /// Minutes past the scheduled time before an unmatched ride expires
    pub grace_minutes: i64,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 50,
            grace_minutes: 15,
        }
    }
}

/// Outcome of one activation attempt
///
/// These are expected, frequent branches, not exceptions: `Retry` means no
/// driver yet but still inside the grace window, `AlreadyProcessed` means a
/// concurrent pass or cancellation won the ride first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated(i32),
    Retry,
    Expired,
    AlreadyProcessed,
}

/// Aggregate counts reported by one activation pass
#[derive(Debug, Default, Clone, Serialize, ToSchema)]
pub struct PassSummary {
    pub activated: u32,
    pub retried: u32,
    pub expired: u32,
    pub already_processed: u32,
    pub failed: u32,
}

/// Drives activation of due scheduled rides against the ride store
pub struct DispatchEngine<S> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    events: Arc<dyn EventRoom>,
    policy: DispatchPolicy,
}

impl<S: RideStore> DispatchEngine<S> {
    pub fn new(
        store: Arc<S>,
        notifier: Arc<dyn Notifier>,
        events: Arc<dyn EventRoom>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            events,
            policy,
        }
    }

    /// Attempt to activate one due ride
    ///
    /// Finds the best candidate driver and runs the guarded commit; with no
    /// candidate, expires the ride once it is more than the grace window
    /// past its scheduled time, otherwise leaves it for the next pass.
    pub async fn activate_ride(
        &self,
        ride: &RideRequest,
        now: DateTime<Utc>,
    ) -> Result<ActivationOutcome, StoreError> {
        let candidates = self.store.available_drivers(ride.tariff_id).await?;

        match matcher::nearest_driver(ride.pickup(), &candidates) {
            Some(driver) => match self.store.assign_driver(ride.id, driver.id, now).await? {
                CommitOutcome::Activated => Ok(ActivationOutcome::Activated(driver.id)),
                CommitOutcome::AlreadyProcessed => Ok(ActivationOutcome::AlreadyProcessed),
                // The driver was claimed between matching and commit;
                // re-match on the next pass
                CommitOutcome::DriverUnavailable => Ok(ActivationOutcome::Retry),
                CommitOutcome::Expired => Ok(ActivationOutcome::Expired),
            },
            None => {
                let overdue = now - ride.schedule_at;
                if overdue > Duration::minutes(self.policy.grace_minutes) {
                    match self.store.expire_ride(ride.id, now).await? {
                        CommitOutcome::Expired => Ok(ActivationOutcome::Expired),
                        _ => Ok(ActivationOutcome::AlreadyProcessed),
                    }
                } else {
                    Ok(ActivationOutcome::Retry)
                }
            }
        }
    }

    /// Run one activation pass over all due rides
    ///
    /// Each ride is handled independently; one failure is logged and counted
    /// but never aborts the batch or touches sibling rides.
    pub async fn run_activation_pass(&self, now: DateTime<Utc>) -> PassSummary {
        let mut summary = PassSummary::default();

        let due = match self.store.due_rides(now, self.policy.batch_size).await {
            Ok(rides) => rides,
            Err(err) => {
                tracing::error!("Activation pass could not scan due rides: {}", err);
                summary.failed += 1;
                return summary;
            }
        };

        tracing::debug!(due = due.len(), "Activation pass starting");

        for ride in due {
            match self.activate_ride(&ride, now).await {
                Ok(ActivationOutcome::Activated(driver_id)) => {
                    summary.activated += 1;
                    self.notify_activation(&ride, driver_id).await;
                }
                Ok(ActivationOutcome::Retry) => {
                    summary.retried += 1;
                    tracing::debug!(ride_id = %ride.id, "No driver yet, will retry next pass");
                }
                Ok(ActivationOutcome::Expired) => {
                    summary.expired += 1;
                    self.notify_expiry(&ride).await;
                }
                Ok(ActivationOutcome::AlreadyProcessed) => {
                    summary.already_processed += 1;
                }
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(ride_id = %ride.id, "Activation attempt failed: {}", err);
                }
            }
        }

        tracing::info!(
            activated = summary.activated,
            retried = summary.retried,
            expired = summary.expired,
            already_processed = summary.already_processed,
            failed = summary.failed,
            "Activation pass finished"
        );
        summary
    }

    /// Post-commit notifications for a successful activation. Best effort:
    /// failures are logged and swallowed, never propagated.
    async fn notify_activation(&self, ride: &RideRequest, driver_id: i32) {
        let data = json!({ "ride_id": ride.id, "driver_id": driver_id });

        if let Err(err) = self
            .notifier
            .notify(
                ride.rider_id,
                "Driver assigned",
                "Your scheduled ride is on its way",
                data.clone(),
            )
            .await
        {
            tracing::warn!(ride_id = %ride.id, "Rider notification failed: {}", err);
        }

        if let Err(err) = self
            .notifier
            .notify(
                driver_id,
                "New trip assigned",
                &format!("Pickup at {}", ride.pickup_address),
                data.clone(),
            )
            .await
        {
            tracing::warn!(ride_id = %ride.id, "Driver notification failed: {}", err);
        }

        let room = format!("ride:{}", ride.id);
        if let Err(err) = self.events.emit(&room, "ride_activated", data).await {
            tracing::warn!(ride_id = %ride.id, "Room event failed: {}", err);
        }
    }

    /// Post-commit notification for an expired ride
    async fn notify_expiry(&self, ride: &RideRequest) {
        let data = json!({ "ride_id": ride.id, "refunded": true });
        if let Err(err) = self
            .notifier
            .notify(
                ride.rider_id,
                "Ride expired",
                "No driver was available; your payment has been refunded",
                data,
            )
            .await
        {
            tracing::warn!(ride_id = %ride.id, "Expiry notification failed: {}", err);
        }
    }
}
