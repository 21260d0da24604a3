use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::validation::{validate_latitude, validate_longitude};

/// Ride status enum representing the lifecycle of a scheduled ride
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
    Expired,
}

impl RideStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Scheduled => "scheduled",
            RideStatus::Active => "active",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
            RideStatus::Expired => "expired",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(RideStatus::Scheduled),
            "active" => Ok(RideStatus::Active),
            "completed" => Ok(RideStatus::Completed),
            "cancelled" => Ok(RideStatus::Cancelled),
            "expired" => Ok(RideStatus::Expired),
            _ => Err(format!("Invalid ride status: {}", s)),
        }
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment status enum for the prepaid flow
///
/// Moves `paid -> refunded` only, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the rider paid at booking time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Wallet,
    Gateway,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Gateway => "gateway",
        };
        write!(f, "{}", s)
    }
}

/// Coupon discount kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

/// Who triggered a cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CancelledBy {
    Rider,
    Driver,
    Admin,
}

/// Domain model representing a ride request in the database
///
/// `driver_id` stays null until the lifecycle commit assigns one; once the
/// ride is active it is never reassigned.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RideRequest {
    pub id: Uuid,
    pub rider_id: i32,
    pub driver_id: Option<i32>,
    pub tariff_id: Option<i32>,
    pub is_schedule: bool,
    pub is_prepaid: bool,
    pub schedule_at: DateTime<Utc>,
    pub status: RideStatus,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub pickup_address: String,
    pub dropoff_lat: f64,
    pub dropoff_lng: f64,
    pub dropoff_address: String,
    pub base_fare: Decimal,
    pub distance_charge: Decimal,
    pub time_charge: Decimal,
    pub coupon_discount: Decimal,
    pub total_amount: Decimal,
    pub cancelled_by: Option<CancelledBy>,
    pub cancel_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RideRequest {
    /// Pickup coordinates as a pair, for the matcher
    pub fn pickup(&self) -> (f64, f64) {
        (self.pickup_lat, self.pickup_lng)
    }
}

/// Domain model representing the payment attached to a ride
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub txn_ref: Option<String>,
    pub refund_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tariff rates consulted by the fare estimator
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tariff {
    pub id: i32,
    pub name: String,
    pub base_fare: Decimal,
    pub per_km: Decimal,
    pub per_minute: Decimal,
    pub minimum_fare: Decimal,
    pub is_active: bool,
}

/// Coupon consulted by the fare estimator
///
/// Validity is judged on the target schedule date, not the booking date.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Coupon {
    pub id: i32,
    pub code: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub max_discount: Option<Decimal>,
    pub is_active: bool,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Driver subset of the users table, read by the matcher
///
/// The matcher only reads this; the lifecycle commit is the sole writer that
/// flips `is_available` to false on assignment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Driver {
    pub id: i32,
    pub full_name: String,
    pub is_online: bool,
    pub is_available: bool,
    pub is_verified: bool,
    pub status: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub service_id: Option<i32>,
}

/// A geographic point with its display address
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct GeoPointRequest {
    #[validate(custom = "validate_latitude")]
    #[schema(example = 33.589886)]
    pub lat: f64,
    #[validate(custom = "validate_longitude")]
    #[schema(example = -7.603869)]
    pub lng: f64,
    #[validate(length(min = 1, message = "Address must not be empty"))]
    #[schema(example = "12 Boulevard d'Anfa")]
    pub address: String,
}

/// Request DTO for booking a scheduled, prepaid ride
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ScheduleRideRequest {
    #[schema(example = 17)]
    pub rider_id: i32,
    /// Target departure time; must be at least the minimum lead time ahead
    pub schedule_at: DateTime<Utc>,
    #[validate]
    pub pickup: GeoPointRequest,
    #[validate]
    pub dropoff: GeoPointRequest,
    pub tariff_id: Option<i32>,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    /// Gateway/wallet transaction reference proving prepayment
    #[validate(length(min = 1, message = "Payment reference is required"))]
    pub payment_ref: String,
}

/// Request DTO for rider-initiated cancellation
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CancelRideRequest {
    #[schema(example = 17)]
    pub rider_id: i32,
    #[validate(length(max = 500, message = "Reason too long"))]
    pub reason: Option<String>,
}

/// Response DTO for a ride
#[derive(Debug, Serialize, ToSchema)]
pub struct RideResponse {
    pub id: Uuid,
    pub rider_id: i32,
    pub driver_id: Option<i32>,
    pub tariff_id: Option<i32>,
    pub schedule_at: DateTime<Utc>,
    pub status: RideStatus,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub base_fare: Decimal,
    pub distance_charge: Decimal,
    pub time_charge: Decimal,
    pub coupon_discount: Decimal,
    pub total_amount: Decimal,
    pub cancelled_by: Option<CancelledBy>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<RideRequest> for RideResponse {
    fn from(ride: RideRequest) -> Self {
        Self {
            id: ride.id,
            rider_id: ride.rider_id,
            driver_id: ride.driver_id,
            tariff_id: ride.tariff_id,
            schedule_at: ride.schedule_at,
            status: ride.status,
            pickup_address: ride.pickup_address,
            dropoff_address: ride.dropoff_address,
            base_fare: ride.base_fare,
            distance_charge: ride.distance_charge,
            time_charge: ride.time_charge,
            coupon_discount: ride.coupon_discount,
            total_amount: ride.total_amount,
            cancelled_by: ride.cancelled_by,
            cancel_reason: ride.cancel_reason,
            created_at: ride.created_at,
        }
    }
}

/// Response DTO for the payment attached to a ride
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub txn_ref: Option<String>,
    pub refund_amount: Option<Decimal>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            ride_id: payment.ride_id,
            amount: payment.amount,
            method: payment.method,
            status: payment.status,
            txn_ref: payment.txn_ref,
            refund_amount: payment.refund_amount,
        }
    }
}

/// Response DTO for a successful booking
#[derive(Debug, Serialize, ToSchema)]
pub struct ScheduleRideResponse {
    pub ride: RideResponse,
    pub payment: PaymentResponse,
}

/// Response DTO for a successful cancellation
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelRideResponse {
    pub ride: RideResponse,
    pub refund_amount: Decimal,
}
