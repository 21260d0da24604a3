use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::rides::{Coupon, DiscountType, Tariff};

/// Average speed used to derive a trip duration from the route distance,
/// since the booking request carries no duration of its own.
pub const AVG_SPEED_KMH: f64 = 30.0;

/// Fare breakdown produced by the estimator and persisted on the ride
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FareBreakdown {
    pub base_fare: Decimal,
    pub distance_charge: Decimal,
    pub time_charge: Decimal,
    pub coupon_discount: Decimal,
    pub total: Decimal,
}

/// Pure fare computation, no side effects
pub struct FareEstimator;

impl FareEstimator {
    /// Compute the prepaid fare for a scheduled ride
    ///
    /// `total = max(base + km * per_km + minutes * per_minute, minimum) - coupon + extras`,
    /// floored at zero. Coupon validity is judged on `schedule_at`, the
    /// target departure, not the booking date.
    ///
    /// # Arguments
    /// * `tariff` - rate card to apply
    /// * `distance_km` - route distance in kilometres
    /// * `duration_secs` - estimated trip duration in seconds
    /// * `coupon` - coupon matched by code, if any
    /// * `schedule_at` - target departure time
    /// * `extra_charges` - surcharges added after the discount
    pub fn estimate(
        tariff: &Tariff,
        distance_km: Decimal,
        duration_secs: i64,
        coupon: Option<&Coupon>,
        schedule_at: DateTime<Utc>,
        extra_charges: Decimal,
    ) -> FareBreakdown {
        let distance_charge = (distance_km * tariff.per_km).round_dp(2);
        let minutes = Decimal::from(duration_secs) / Decimal::from(60);
        let time_charge = (minutes * tariff.per_minute).round_dp(2);

        let mut subtotal = tariff.base_fare + distance_charge + time_charge;
        if subtotal < tariff.minimum_fare {
            subtotal = tariff.minimum_fare;
        }

        let coupon_discount = coupon
            .map(|c| Self::coupon_discount(c, subtotal, schedule_at))
            .unwrap_or(Decimal::ZERO);

        let mut total = subtotal - coupon_discount + extra_charges;
        if total < Decimal::ZERO {
            total = Decimal::ZERO;
        }

        FareBreakdown {
            base_fare: tariff.base_fare,
            distance_charge,
            time_charge,
            coupon_discount,
            total: total.round_dp(2),
        }
    }

    /// Discount contributed by a coupon against a fare subtotal
    ///
    /// Returns zero when the coupon is inactive or `at` falls outside its
    /// validity window. Percentage discounts are capped at `max_discount`.
    pub fn coupon_discount(coupon: &Coupon, subtotal: Decimal, at: DateTime<Utc>) -> Decimal {
        if !coupon.is_active || at < coupon.starts_at || at > coupon.ends_at {
            return Decimal::ZERO;
        }

        match coupon.discount_type {
            DiscountType::Percentage => {
                let mut discount = (subtotal * coupon.value / Decimal::from(100)).round_dp(2);
                if let Some(cap) = coupon.max_discount {
                    if discount > cap {
                        discount = cap;
                    }
                }
                discount
            }
            DiscountType::Fixed => coupon.value,
        }
    }

    /// Estimate a trip duration from the route distance at the average speed
    pub fn estimated_duration_secs(distance_km: f64) -> i64 {
        (distance_km / AVG_SPEED_KMH * 3600.0).round() as i64
    }
}
