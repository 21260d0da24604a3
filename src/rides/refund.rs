use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::rides::RideStatus;

/// Pure time-based refund policy for prepaid scheduled rides
pub struct RefundPolicy;

impl RefundPolicy {
    /// Refund owed when a ride is cancelled at `now`
    ///
    /// - `active` or `completed`: nothing back
    /// - more than one hour before departure: full amount
    /// - inside the last hour but before departure: half
    /// - past the scheduled time (not yet swept by the poller): nothing
    pub fn refund_amount(
        status: RideStatus,
        schedule_at: DateTime<Utc>,
        now: DateTime<Utc>,
        amount: Decimal,
    ) -> Decimal {
        if matches!(status, RideStatus::Active | RideStatus::Completed) {
            return Decimal::ZERO;
        }

        let seconds_until_ride = (schedule_at - now).num_seconds();
        if seconds_until_ride > 3600 {
            amount
        } else if seconds_until_ride > 0 {
            (amount / Decimal::from(2)).round_dp(2)
        } else {
            Decimal::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_full_refund_more_than_an_hour_out() {
        let now = Utc::now();
        let refund = RefundPolicy::refund_amount(
            RideStatus::Scheduled,
            now + Duration::hours(2),
            now,
            dec!(20.00),
        );
        assert_eq!(refund, dec!(20.00));
    }

    #[test]
    fn test_half_refund_inside_last_hour() {
        let now = Utc::now();
        let refund = RefundPolicy::refund_amount(
            RideStatus::Scheduled,
            now + Duration::minutes(30),
            now,
            dec!(20.00),
        );
        assert_eq!(refund, dec!(10.00));
    }

    #[test]
    fn test_no_refund_past_schedule_time() {
        let now = Utc::now();
        let refund = RefundPolicy::refund_amount(
            RideStatus::Scheduled,
            now - Duration::minutes(5),
            now,
            dec!(20.00),
        );
        assert_eq!(refund, Decimal::ZERO);
    }

    #[test]
    fn test_no_refund_once_active_or_completed() {
        let now = Utc::now();
        for status in [RideStatus::Active, RideStatus::Completed] {
            let refund = RefundPolicy::refund_amount(
                status,
                now + Duration::hours(5),
                now,
                dec!(20.00),
            );
            assert_eq!(refund, Decimal::ZERO);
        }
    }

    #[test]
    fn test_exactly_one_hour_is_half() {
        // The boundary belongs to the 50% band: "more than" one hour means strictly more
        let now = Utc::now();
        let refund = RefundPolicy::refund_amount(
            RideStatus::Scheduled,
            now + Duration::hours(1),
            now,
            dec!(20.00),
        );
        assert_eq!(refund, dec!(10.00));
    }

    #[test]
    fn test_odd_amount_rounds_to_cents() {
        let now = Utc::now();
        let refund = RefundPolicy::refund_amount(
            RideStatus::Scheduled,
            now + Duration::minutes(30),
            now,
            dec!(19.99),
        );
        assert_eq!(refund, dec!(10.00));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// A refund never exceeds the amount paid and is never negative
    #[test]
    fn prop_refund_bounded_by_amount() {
        proptest!(|(
            amount_cents in 0u32..=1_000_000u32,
            offset_minutes in -600i64..=600
        )| {
            let now = Utc::now();
            let amount = Decimal::from(amount_cents) / Decimal::from(100);
            let refund = RefundPolicy::refund_amount(
                RideStatus::Scheduled,
                now + chrono::Duration::minutes(offset_minutes),
                now,
                amount,
            );
            prop_assert!(refund >= Decimal::ZERO);
            prop_assert!(refund <= amount);
        });
    }
}
