// Postgres implementation of the ride store
//
// Every guarded lifecycle commit runs at SERIALIZABLE isolation with a
// bounded statement timeout and re-reads the rows it is about to write
// (FOR UPDATE) inside the transaction, so overlapping activation passes or
// a racing cancellation resolve to one winner and harmless no-ops. Wallet
// balance changes and their ledger entries always share the transaction of
// the status change they accompany.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::rides::{
    Coupon, Driver, Payment, PaymentMethod, PaymentStatus, RideRequest, RideStatus, StatusMachine,
    Tariff,
};
use crate::store::{CancelRecord, CommitOutcome, NewBooking, RideScope, RideStore, StoreError};
use crate::wallet::{WalletEntryType, WalletHistory};

const RIDE_COLUMNS: &str = "id, rider_id, driver_id, tariff_id, is_schedule, is_prepaid, \
     schedule_at, status, pickup_lat, pickup_lng, pickup_address, dropoff_lat, dropoff_lng, \
     dropoff_address, base_fare, distance_charge, time_charge, coupon_discount, total_amount, \
     cancelled_by, cancel_reason, started_at, created_at, updated_at";

const PAYMENT_COLUMNS: &str =
    "id, ride_id, amount, method, status, txn_ref, refund_amount, created_at, updated_at";

const DRIVER_COLUMNS: &str =
    "id, full_name, is_online, is_available, is_verified, status, lat, lng, service_id";

/// Ride store backed by PostgreSQL
#[derive(Clone)]
pub struct PgRideStore {
    pool: PgPool,
}

impl PgRideStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a serializable transaction with a bounded statement timeout.
    /// A serialization failure aborts the commit; the poller simply retries
    /// the ride on its next pass.
    async fn begin_serializable(&self) -> Result<Transaction<'_, Postgres>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        sqlx::query("SET LOCAL statement_timeout = '5s'")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

/// Debit a wallet and append the matching ledger entry, both on the caller's
/// transaction. Fails the whole unit when the balance is short.
async fn debit_wallet(
    conn: &mut PgConnection,
    user_id: i32,
    amount: Decimal,
    ride_id: Uuid,
    note: &str,
) -> Result<(), StoreError> {
    let balance: Option<Decimal> =
        sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    let balance = balance.ok_or(StoreError::NotFound("Wallet"))?;

    if balance < amount {
        return Err(StoreError::InsufficientBalance {
            balance,
            required: amount,
        });
    }

    sqlx::query("UPDATE wallets SET balance = balance - $1, updated_at = NOW() WHERE user_id = $2")
        .bind(amount)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "INSERT INTO wallet_history (user_id, ride_id, entry_type, amount, note) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(ride_id)
    .bind(WalletEntryType::Debit)
    .bind(amount)
    .bind(note)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Credit a wallet and append the matching ledger entry, both on the
/// caller's transaction.
async fn credit_wallet(
    conn: &mut PgConnection,
    user_id: i32,
    amount: Decimal,
    ride_id: Uuid,
    note: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO wallets (user_id, balance) VALUES ($1, $2) \
         ON CONFLICT (user_id) \
         DO UPDATE SET balance = wallets.balance + EXCLUDED.balance, updated_at = NOW()",
    )
    .bind(user_id)
    .bind(amount)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "INSERT INTO wallet_history (user_id, ride_id, entry_type, amount, note) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(ride_id)
    .bind(WalletEntryType::Credit)
    .bind(amount)
    .bind(note)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait]
impl RideStore for PgRideStore {
    async fn create_booking(
        &self,
        booking: NewBooking,
        _now: DateTime<Utc>,
    ) -> Result<(RideRequest, Payment), StoreError> {
        let mut tx = self.pool.begin().await?;

        let ride = sqlx::query_as::<_, RideRequest>(&format!(
            "INSERT INTO ride_requests \
             (rider_id, tariff_id, is_schedule, is_prepaid, schedule_at, status, \
              pickup_lat, pickup_lng, pickup_address, dropoff_lat, dropoff_lng, dropoff_address, \
              base_fare, distance_charge, time_charge, coupon_discount, total_amount) \
             VALUES ($1, $2, TRUE, TRUE, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {RIDE_COLUMNS}"
        ))
        .bind(booking.rider_id)
        .bind(booking.tariff_id)
        .bind(booking.schedule_at)
        .bind(RideStatus::Scheduled)
        .bind(booking.pickup_lat)
        .bind(booking.pickup_lng)
        .bind(&booking.pickup_address)
        .bind(booking.dropoff_lat)
        .bind(booking.dropoff_lng)
        .bind(&booking.dropoff_address)
        .bind(booking.fare.base_fare)
        .bind(booking.fare.distance_charge)
        .bind(booking.fare.time_charge)
        .bind(booking.fare.coupon_discount)
        .bind(booking.fare.total)
        .fetch_one(&mut *tx)
        .await?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments (ride_id, amount, method, status, txn_ref) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(ride.id)
        .bind(booking.fare.total)
        .bind(booking.method)
        .bind(PaymentStatus::Paid)
        .bind(&booking.txn_ref)
        .fetch_one(&mut *tx)
        .await?;

        if booking.method == PaymentMethod::Wallet {
            debit_wallet(
                &mut *tx,
                booking.rider_id,
                booking.fare.total,
                ride.id,
                "scheduled ride prepayment",
            )
            .await?;
        }

        tx.commit().await?;
        Ok((ride, payment))
    }

    async fn find_ride(&self, ride_id: Uuid) -> Result<Option<RideRequest>, StoreError> {
        let ride = sqlx::query_as::<_, RideRequest>(&format!(
            "SELECT {RIDE_COLUMNS} FROM ride_requests WHERE id = $1"
        ))
        .bind(ride_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ride)
    }

    async fn find_payment(&self, ride_id: Uuid) -> Result<Option<Payment>, StoreError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE ride_id = $1"
        ))
        .bind(ride_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    async fn find_tariff(&self, tariff_id: i32) -> Result<Option<Tariff>, StoreError> {
        let tariff = sqlx::query_as::<_, Tariff>(
            "SELECT id, name, base_fare, per_km, per_minute, minimum_fare, is_active \
             FROM tariffs WHERE id = $1 AND is_active",
        )
        .bind(tariff_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tariff)
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        let coupon = sqlx::query_as::<_, Coupon>(
            "SELECT id, code, discount_type, value, max_discount, is_active, starts_at, ends_at \
             FROM coupons WHERE UPPER(code) = UPPER($1)",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(coupon)
    }

    async fn list_upcoming(
        &self,
        scope: RideScope,
        status: Option<RideStatus>,
        limit: i64,
    ) -> Result<Vec<RideRequest>, StoreError> {
        let rider_id = match scope {
            RideScope::Rider(id) => Some(id),
            RideScope::All => None,
        };

        let rides = sqlx::query_as::<_, RideRequest>(&format!(
            "SELECT {RIDE_COLUMNS} FROM ride_requests \
             WHERE is_schedule AND is_prepaid \
               AND ($1::int IS NULL OR rider_id = $1) \
               AND ($2::text IS NULL OR status = $2) \
             ORDER BY schedule_at ASC \
             LIMIT $3"
        ))
        .bind(rider_id)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rides)
    }

    async fn due_rides(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<RideRequest>, StoreError> {
        let rides = sqlx::query_as::<_, RideRequest>(&format!(
            "SELECT r.{} FROM ride_requests r \
             JOIN payments p ON p.ride_id = r.id AND p.status = 'paid' \
             WHERE r.is_schedule AND r.is_prepaid \
               AND r.status = 'scheduled' \
               AND r.driver_id IS NULL \
               AND r.schedule_at <= $1 \
             ORDER BY r.schedule_at ASC \
             LIMIT $2",
            RIDE_COLUMNS.replace(", ", ", r.")
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rides)
    }

    async fn available_drivers(&self, service_id: Option<i32>) -> Result<Vec<Driver>, StoreError> {
        let drivers = sqlx::query_as::<_, Driver>(&format!(
            "SELECT {DRIVER_COLUMNS} FROM users \
             WHERE role = 'driver' AND status = 'active' \
               AND is_online AND is_available AND is_verified \
               AND ($1::int IS NULL OR service_id IS NULL OR service_id = $1)"
        ))
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(drivers)
    }

    async fn assign_driver(
        &self,
        ride_id: Uuid,
        driver_id: i32,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError> {
        let mut tx = self.begin_serializable().await?;

        // Re-read under lock: a concurrent pass or cancellation may have won
        let ride: Option<(RideStatus, Option<i32>)> = sqlx::query_as(
            "SELECT status, driver_id FROM ride_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(ride_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (status, current_driver) = ride.ok_or(StoreError::NotFound("Ride"))?;
        if status != RideStatus::Scheduled || current_driver.is_some() {
            return Ok(CommitOutcome::AlreadyProcessed);
        }

        let driver: Option<(bool, bool, bool, String)> = sqlx::query_as(
            "SELECT is_online, is_available, is_verified, status \
             FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(driver_id)
        .fetch_optional(&mut *tx)
        .await?;

        let still_free = matches!(
            driver,
            Some((true, true, true, ref s)) if s == "active"
        );
        if !still_free {
            return Ok(CommitOutcome::DriverUnavailable);
        }

        let next = StatusMachine::transition(status, RideStatus::Active)
            .map_err(StoreError::Database)?;

        sqlx::query(
            "UPDATE ride_requests \
             SET status = $1, driver_id = $2, started_at = $3, updated_at = NOW() \
             WHERE id = $4",
        )
        .bind(next)
        .bind(driver_id)
        .bind(now)
        .bind(ride_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET is_available = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(driver_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(CommitOutcome::Activated)
    }

    async fn expire_ride(
        &self,
        ride_id: Uuid,
        _now: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError> {
        let mut tx = self.begin_serializable().await?;

        let ride: Option<(RideStatus, Option<i32>, i32)> = sqlx::query_as(
            "SELECT status, driver_id, rider_id FROM ride_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(ride_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (status, current_driver, rider_id) = ride.ok_or(StoreError::NotFound("Ride"))?;
        if status != RideStatus::Scheduled || current_driver.is_some() {
            return Ok(CommitOutcome::AlreadyProcessed);
        }

        let payment: Option<(Decimal, PaymentMethod, PaymentStatus)> = sqlx::query_as(
            "SELECT amount, method, status FROM payments WHERE ride_id = $1 FOR UPDATE",
        )
        .bind(ride_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (amount, method, payment_status) = payment.ok_or(StoreError::NotFound("Payment"))?;

        let next = StatusMachine::transition(status, RideStatus::Expired)
            .map_err(StoreError::Database)?;

        sqlx::query("UPDATE ride_requests SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(next)
            .bind(ride_id)
            .execute(&mut *tx)
            .await?;

        if payment_status == PaymentStatus::Paid {
            sqlx::query(
                "UPDATE payments SET status = $1, refund_amount = $2, updated_at = NOW() \
                 WHERE ride_id = $3",
            )
            .bind(PaymentStatus::Refunded)
            .bind(amount)
            .bind(ride_id)
            .execute(&mut *tx)
            .await?;

            if method == PaymentMethod::Wallet {
                credit_wallet(
                    &mut *tx,
                    rider_id,
                    amount,
                    ride_id,
                    "no driver found, ride expired",
                )
                .await?;
            }
        }

        tx.commit().await?;
        Ok(CommitOutcome::Expired)
    }

    async fn cancel_ride(
        &self,
        record: CancelRecord,
        _now: DateTime<Utc>,
    ) -> Result<Option<RideRequest>, StoreError> {
        let mut tx = self.begin_serializable().await?;

        let ride = sqlx::query_as::<_, RideRequest>(&format!(
            "SELECT {RIDE_COLUMNS} FROM ride_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(record.ride_id)
        .fetch_optional(&mut *tx)
        .await?;

        let ride = ride.ok_or(StoreError::NotFound("Ride"))?;
        if ride.status != RideStatus::Scheduled {
            // A concurrent activation or cancellation won; leave everything alone
            return Ok(None);
        }

        let next = StatusMachine::transition(ride.status, RideStatus::Cancelled)
            .map_err(StoreError::Database)?;

        let cancelled = sqlx::query_as::<_, RideRequest>(&format!(
            "UPDATE ride_requests \
             SET status = $1, cancelled_by = $2, cancel_reason = $3, updated_at = NOW() \
             WHERE id = $4 \
             RETURNING {RIDE_COLUMNS}"
        ))
        .bind(next)
        .bind(record.cancelled_by)
        .bind(&record.reason)
        .bind(record.ride_id)
        .fetch_one(&mut *tx)
        .await?;

        if record.refund_amount > Decimal::ZERO {
            let method: Option<PaymentMethod> = sqlx::query_scalar(
                "SELECT method FROM payments WHERE ride_id = $1 FOR UPDATE",
            )
            .bind(record.ride_id)
            .fetch_optional(&mut *tx)
            .await?;
            let method = method.ok_or(StoreError::NotFound("Payment"))?;

            sqlx::query(
                "UPDATE payments SET status = $1, refund_amount = $2, updated_at = NOW() \
                 WHERE ride_id = $3",
            )
            .bind(PaymentStatus::Refunded)
            .bind(record.refund_amount)
            .bind(record.ride_id)
            .execute(&mut *tx)
            .await?;

            if method == PaymentMethod::Wallet {
                credit_wallet(
                    &mut *tx,
                    cancelled.rider_id,
                    record.refund_amount,
                    record.ride_id,
                    "ride cancellation refund",
                )
                .await?;
            }
            // Non-wallet refunds settle gateway-side; the refunded payment
            // row is the record the settlement job consumes.
        }

        tx.commit().await?;
        Ok(Some(cancelled))
    }

    async fn wallet_balance(&self, user_id: i32) -> Result<Decimal, StoreError> {
        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        balance.ok_or(StoreError::NotFound("Wallet"))
    }

    async fn wallet_history(&self, user_id: i32) -> Result<Vec<WalletHistory>, StoreError> {
        let history = sqlx::query_as::<_, WalletHistory>(
            "SELECT id, user_id, ride_id, entry_type, amount, note, created_at \
             FROM wallet_history WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(history)
    }
}
