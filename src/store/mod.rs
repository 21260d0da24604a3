// Durable record of rides, payments and wallet ledgers
//
// The trait keeps the engine and services independent of the storage
// backend: production runs on Postgres, tests on an in-memory store with
// the same one-winner commit semantics.

pub mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgRideStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::rides::{
    CancelledBy, Coupon, Driver, FareBreakdown, Payment, PaymentMethod, RideRequest, RideStatus,
    Tariff,
};
use crate::wallet::WalletHistory;

/// Errors surfaced by a ride store backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("insufficient wallet balance: have {balance}, need {required}")]
    InsufficientBalance { balance: Decimal, required: Decimal },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Result of a guarded lifecycle commit
///
/// `AlreadyProcessed` is the harmless no-op a losing racer observes after
/// the in-transaction re-read; `DriverUnavailable` means the chosen driver
/// was claimed between matching and commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Activated,
    Expired,
    AlreadyProcessed,
    DriverUnavailable,
}

/// Everything the booking transaction persists in one unit
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub rider_id: i32,
    pub tariff_id: Option<i32>,
    pub schedule_at: DateTime<Utc>,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub pickup_address: String,
    pub dropoff_lat: f64,
    pub dropoff_lng: f64,
    pub dropoff_address: String,
    pub fare: FareBreakdown,
    pub method: PaymentMethod,
    pub txn_ref: String,
}

/// Everything the cancellation transaction persists in one unit
#[derive(Debug, Clone)]
pub struct CancelRecord {
    pub ride_id: Uuid,
    pub cancelled_by: CancelledBy,
    pub reason: Option<String>,
    pub refund_amount: Decimal,
}

/// Whose rides a listing covers
#[derive(Debug, Clone, Copy)]
pub enum RideScope {
    Rider(i32),
    All,
}

#[async_trait]
pub trait RideStore: Send + Sync + 'static {
    /// Create the ride and its paid payment record atomically; for wallet
    /// payments the rider's balance is debited with a matching ledger entry
    /// in the same transaction, failing the whole unit when funds are short.
    async fn create_booking(
        &self,
        booking: NewBooking,
        now: DateTime<Utc>,
    ) -> Result<(RideRequest, Payment), StoreError>;

    async fn find_ride(&self, ride_id: Uuid) -> Result<Option<RideRequest>, StoreError>;

    async fn find_payment(&self, ride_id: Uuid) -> Result<Option<Payment>, StoreError>;

    async fn find_tariff(&self, tariff_id: i32) -> Result<Option<Tariff>, StoreError>;

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, StoreError>;

    /// Prepaid scheduled-ride bookings, soonest first, optionally narrowed
    /// to one rider and one lifecycle status. No time cutoff: past and
    /// terminal bookings come back unless the caller filters by status.
    async fn list_upcoming(
        &self,
        scope: RideScope,
        status: Option<RideStatus>,
        limit: i64,
    ) -> Result<Vec<RideRequest>, StoreError>;

    /// Prepaid scheduled rides whose time has arrived, still unassigned and
    /// backed by a paid payment, earliest due first
    async fn due_rides(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<RideRequest>, StoreError>;

    /// Active, online, available, verified drivers. The service filter only
    /// excludes drivers affiliated with a *different* service; drivers with
    /// no affiliation are eligible for every ride.
    async fn available_drivers(&self, service_id: Option<i32>) -> Result<Vec<Driver>, StoreError>;

    /// Guarded activation commit: re-reads the ride and driver inside a
    /// serializable transaction, then assigns the driver, marks the ride
    /// active and flips the driver unavailable, all or nothing.
    async fn assign_driver(
        &self,
        ride_id: Uuid,
        driver_id: i32,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError>;

    /// Guarded expiry commit: marks the ride expired and its payment
    /// refunded (crediting the wallet for wallet payments) when the ride is
    /// still scheduled and unassigned.
    async fn expire_ride(
        &self,
        ride_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError>;

    /// Guarded cancellation commit. Returns `None` when the ride is no
    /// longer `scheduled` (a racing activation won), leaving it untouched.
    async fn cancel_ride(
        &self,
        record: CancelRecord,
        now: DateTime<Utc>,
    ) -> Result<Option<RideRequest>, StoreError>;

    async fn wallet_balance(&self, user_id: i32) -> Result<Decimal, StoreError>;

    async fn wallet_history(&self, user_id: i32) -> Result<Vec<WalletHistory>, StoreError>;
}
