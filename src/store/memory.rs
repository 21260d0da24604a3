// In-memory ride store for tests
//
// One mutex around the whole dataset gives every trait method the same
// all-or-nothing, one-winner semantics the Postgres implementation gets
// from serializable transactions, which is exactly what the concurrency
// tests need to exercise.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::rides::{
    Coupon, Driver, Payment, PaymentMethod, PaymentStatus, RideRequest, RideStatus, StatusMachine,
    Tariff,
};
use crate::store::{CancelRecord, CommitOutcome, NewBooking, RideScope, RideStore, StoreError};
use crate::wallet::{WalletEntryType, WalletHistory};

#[derive(Default)]
struct Inner {
    rides: HashMap<Uuid, RideRequest>,
    payments: HashMap<Uuid, Payment>, // keyed by ride id
    drivers: HashMap<i32, Driver>,
    tariffs: HashMap<i32, Tariff>,
    coupons: HashMap<String, Coupon>, // keyed by uppercase code
    wallets: HashMap<i32, Decimal>,
    history: Vec<WalletHistory>,
    next_history_id: i32,
}

impl Inner {
    fn append_history(
        &mut self,
        user_id: i32,
        ride_id: Option<Uuid>,
        entry_type: WalletEntryType,
        amount: Decimal,
        note: &str,
        now: DateTime<Utc>,
    ) {
        self.next_history_id += 1;
        self.history.push(WalletHistory {
            id: self.next_history_id,
            user_id,
            ride_id,
            entry_type,
            amount,
            note: Some(note.to_string()),
            created_at: now,
        });
    }

    fn credit(&mut self, user_id: i32, amount: Decimal, ride_id: Uuid, note: &str, now: DateTime<Utc>) {
        *self.wallets.entry(user_id).or_insert(Decimal::ZERO) += amount;
        self.append_history(user_id, Some(ride_id), WalletEntryType::Credit, amount, note, now);
    }
}

/// In-memory implementation of the ride store
#[derive(Default)]
pub struct InMemoryRideStore {
    inner: Mutex<Inner>,
}

impl InMemoryRideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tariff(&self, tariff: Tariff) {
        self.inner.lock().unwrap().tariffs.insert(tariff.id, tariff);
    }

    pub fn add_coupon(&self, coupon: Coupon) {
        self.inner
            .lock()
            .unwrap()
            .coupons
            .insert(coupon.code.to_uppercase(), coupon);
    }

    pub fn add_driver(&self, driver: Driver) {
        self.inner.lock().unwrap().drivers.insert(driver.id, driver);
    }

    /// Open a wallet at the given balance, recorded as an initial credit so
    /// the ledger stays reconstructible
    pub fn open_wallet(&self, user_id: i32, balance: Decimal) {
        let mut inner = self.inner.lock().unwrap();
        inner.wallets.insert(user_id, balance);
        if balance > Decimal::ZERO {
            inner.append_history(
                user_id,
                None,
                WalletEntryType::Credit,
                balance,
                "initial top-up",
                Utc::now(),
            );
        }
    }

    /// Insert a pre-built ride together with its payment, for seeding
    /// activation scenarios directly
    pub fn seed_ride(&self, ride: RideRequest, payment: Payment) {
        let mut inner = self.inner.lock().unwrap();
        inner.payments.insert(ride.id, payment);
        inner.rides.insert(ride.id, ride);
    }

    pub fn get_ride(&self, ride_id: Uuid) -> Option<RideRequest> {
        self.inner.lock().unwrap().rides.get(&ride_id).cloned()
    }

    pub fn get_payment(&self, ride_id: Uuid) -> Option<Payment> {
        self.inner.lock().unwrap().payments.get(&ride_id).cloned()
    }

    pub fn get_driver(&self, driver_id: i32) -> Option<Driver> {
        self.inner.lock().unwrap().drivers.get(&driver_id).cloned()
    }
}

#[async_trait]
impl RideStore for InMemoryRideStore {
    async fn create_booking(
        &self,
        booking: NewBooking,
        now: DateTime<Utc>,
    ) -> Result<(RideRequest, Payment), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        // Check funds before touching anything so a failed debit leaves no
        // partial booking behind
        if booking.method == PaymentMethod::Wallet {
            let balance = *inner
                .wallets
                .get(&booking.rider_id)
                .ok_or(StoreError::NotFound("Wallet"))?;
            if balance < booking.fare.total {
                return Err(StoreError::InsufficientBalance {
                    balance,
                    required: booking.fare.total,
                });
            }
        }

        let ride = RideRequest {
            id: Uuid::new_v4(),
            rider_id: booking.rider_id,
            driver_id: None,
            tariff_id: booking.tariff_id,
            is_schedule: true,
            is_prepaid: true,
            schedule_at: booking.schedule_at,
            status: RideStatus::Scheduled,
            pickup_lat: booking.pickup_lat,
            pickup_lng: booking.pickup_lng,
            pickup_address: booking.pickup_address.clone(),
            dropoff_lat: booking.dropoff_lat,
            dropoff_lng: booking.dropoff_lng,
            dropoff_address: booking.dropoff_address.clone(),
            base_fare: booking.fare.base_fare,
            distance_charge: booking.fare.distance_charge,
            time_charge: booking.fare.time_charge,
            coupon_discount: booking.fare.coupon_discount,
            total_amount: booking.fare.total,
            cancelled_by: None,
            cancel_reason: None,
            started_at: None,
            created_at: now,
            updated_at: now,
        };

        let payment = Payment {
            id: Uuid::new_v4(),
            ride_id: ride.id,
            amount: booking.fare.total,
            method: booking.method,
            status: PaymentStatus::Paid,
            txn_ref: Some(booking.txn_ref.clone()),
            refund_amount: None,
            created_at: now,
            updated_at: now,
        };

        if booking.method == PaymentMethod::Wallet {
            *inner.wallets.get_mut(&booking.rider_id).unwrap() -= booking.fare.total;
            inner.append_history(
                booking.rider_id,
                Some(ride.id),
                WalletEntryType::Debit,
                booking.fare.total,
                "scheduled ride prepayment",
                now,
            );
        }

        inner.payments.insert(ride.id, payment.clone());
        inner.rides.insert(ride.id, ride.clone());
        Ok((ride, payment))
    }

    async fn find_ride(&self, ride_id: Uuid) -> Result<Option<RideRequest>, StoreError> {
        Ok(self.inner.lock().unwrap().rides.get(&ride_id).cloned())
    }

    async fn find_payment(&self, ride_id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self.inner.lock().unwrap().payments.get(&ride_id).cloned())
    }

    async fn find_tariff(&self, tariff_id: i32) -> Result<Option<Tariff>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .tariffs
            .get(&tariff_id)
            .filter(|t| t.is_active)
            .cloned())
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .coupons
            .get(&code.to_uppercase())
            .cloned())
    }

    async fn list_upcoming(
        &self,
        scope: RideScope,
        status: Option<RideStatus>,
        limit: i64,
    ) -> Result<Vec<RideRequest>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rides: Vec<RideRequest> = inner
            .rides
            .values()
            .filter(|r| r.is_schedule && r.is_prepaid)
            .filter(|r| match scope {
                RideScope::Rider(id) => r.rider_id == id,
                RideScope::All => true,
            })
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        rides.sort_by_key(|r| r.schedule_at);
        rides.truncate(limit as usize);
        Ok(rides)
    }

    async fn due_rides(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<RideRequest>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut due: Vec<RideRequest> = inner
            .rides
            .values()
            .filter(|r| {
                r.is_schedule
                    && r.is_prepaid
                    && r.status == RideStatus::Scheduled
                    && r.driver_id.is_none()
                    && r.schedule_at <= now
                    && inner
                        .payments
                        .get(&r.id)
                        .map_or(false, |p| p.status == PaymentStatus::Paid)
            })
            .cloned()
            .collect();
        due.sort_by_key(|r| r.schedule_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn available_drivers(&self, service_id: Option<i32>) -> Result<Vec<Driver>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut drivers: Vec<Driver> = inner
            .drivers
            .values()
            .filter(|d| d.is_online && d.is_available && d.is_verified && d.status == "active")
            .filter(|d| match (service_id, d.service_id) {
                (Some(wanted), Some(affiliated)) => affiliated == wanted,
                // Unaffiliated drivers serve every ride
                _ => true,
            })
            .cloned()
            .collect();
        drivers.sort_by_key(|d| d.id);
        Ok(drivers)
    }

    async fn assign_driver(
        &self,
        ride_id: Uuid,
        driver_id: i32,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let ride = inner.rides.get(&ride_id).ok_or(StoreError::NotFound("Ride"))?;
        if ride.status != RideStatus::Scheduled || ride.driver_id.is_some() {
            return Ok(CommitOutcome::AlreadyProcessed);
        }

        let still_free = inner.drivers.get(&driver_id).map_or(false, |d| {
            d.is_online && d.is_available && d.is_verified && d.status == "active"
        });
        if !still_free {
            return Ok(CommitOutcome::DriverUnavailable);
        }

        let ride = inner.rides.get_mut(&ride_id).unwrap();
        ride.status = StatusMachine::transition(ride.status, RideStatus::Active)
            .map_err(StoreError::Database)?;
        ride.driver_id = Some(driver_id);
        ride.started_at = Some(now);
        ride.updated_at = now;

        inner.drivers.get_mut(&driver_id).unwrap().is_available = false;
        Ok(CommitOutcome::Activated)
    }

    async fn expire_ride(
        &self,
        ride_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let ride = inner.rides.get(&ride_id).ok_or(StoreError::NotFound("Ride"))?;
        if ride.status != RideStatus::Scheduled || ride.driver_id.is_some() {
            return Ok(CommitOutcome::AlreadyProcessed);
        }
        let rider_id = ride.rider_id;

        let payment = inner
            .payments
            .get_mut(&ride_id)
            .ok_or(StoreError::NotFound("Payment"))?;
        let mut wallet_refund = None;
        if payment.status == PaymentStatus::Paid {
            payment.status = PaymentStatus::Refunded;
            payment.refund_amount = Some(payment.amount);
            payment.updated_at = now;
            if payment.method == PaymentMethod::Wallet {
                wallet_refund = Some(payment.amount);
            }
        }

        if let Some(amount) = wallet_refund {
            inner.credit(rider_id, amount, ride_id, "no driver found, ride expired", now);
        }

        let ride = inner.rides.get_mut(&ride_id).unwrap();
        ride.status = StatusMachine::transition(ride.status, RideStatus::Expired)
            .map_err(StoreError::Database)?;
        ride.updated_at = now;
        Ok(CommitOutcome::Expired)
    }

    async fn cancel_ride(
        &self,
        record: CancelRecord,
        now: DateTime<Utc>,
    ) -> Result<Option<RideRequest>, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let ride = inner
            .rides
            .get(&record.ride_id)
            .ok_or(StoreError::NotFound("Ride"))?;
        if ride.status != RideStatus::Scheduled {
            return Ok(None);
        }
        let rider_id = ride.rider_id;

        let mut wallet_refund = None;
        if record.refund_amount > Decimal::ZERO {
            let payment = inner
                .payments
                .get_mut(&record.ride_id)
                .ok_or(StoreError::NotFound("Payment"))?;
            payment.status = PaymentStatus::Refunded;
            payment.refund_amount = Some(record.refund_amount);
            payment.updated_at = now;
            if payment.method == PaymentMethod::Wallet {
                wallet_refund = Some(record.refund_amount);
            }
        }

        if let Some(amount) = wallet_refund {
            inner.credit(rider_id, amount, record.ride_id, "ride cancellation refund", now);
        }

        let ride = inner.rides.get_mut(&record.ride_id).unwrap();
        ride.status = StatusMachine::transition(ride.status, RideStatus::Cancelled)
            .map_err(StoreError::Database)?;
        ride.cancelled_by = Some(record.cancelled_by);
        ride.cancel_reason = record.reason.clone();
        ride.updated_at = now;
        Ok(Some(ride.clone()))
    }

    async fn wallet_balance(&self, user_id: i32) -> Result<Decimal, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .wallets
            .get(&user_id)
            .copied()
            .ok_or(StoreError::NotFound("Wallet"))
    }

    async fn wallet_history(&self, user_id: i32) -> Result<Vec<WalletHistory>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .history
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect())
    }
}
