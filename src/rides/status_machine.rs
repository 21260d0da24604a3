use crate::rides::RideStatus;

/// Service for managing ride status transitions
pub struct StatusMachine;

impl StatusMachine {
    /// Check if a status transition is valid
    ///
    /// # Valid Transitions
    /// - Scheduled → Active, Cancelled, Expired
    /// - Active → Completed
    /// - Completed, Cancelled, Expired → (terminal, no transitions)
    /// - Any status → Same status (idempotent)
    ///
    /// Status only moves forward; it never regresses.
    pub fn is_valid_transition(from: RideStatus, to: RideStatus) -> bool {
        // Same status is always valid (idempotent)
        if from == to {
            return true;
        }

        match (from, to) {
            (RideStatus::Scheduled, RideStatus::Active) => true,
            (RideStatus::Scheduled, RideStatus::Cancelled) => true,
            (RideStatus::Scheduled, RideStatus::Expired) => true,

            (RideStatus::Active, RideStatus::Completed) => true,

            // Completed, Cancelled and Expired are terminal
            _ => false,
        }
    }

    /// Attempt to transition from one status to another
    ///
    /// # Returns
    /// `Ok(to)` if the transition is valid, `Err(message)` otherwise
    pub fn transition(from: RideStatus, to: RideStatus) -> Result<RideStatus, String> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(format!(
                "Invalid status transition from {} to {}",
                from, to
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduled_to_active() {
        assert!(StatusMachine::is_valid_transition(
            RideStatus::Scheduled,
            RideStatus::Active
        ));
    }

    #[test]
    fn test_scheduled_to_cancelled() {
        assert!(StatusMachine::is_valid_transition(
            RideStatus::Scheduled,
            RideStatus::Cancelled
        ));
    }

    #[test]
    fn test_scheduled_to_expired() {
        assert!(StatusMachine::is_valid_transition(
            RideStatus::Scheduled,
            RideStatus::Expired
        ));
    }

    #[test]
    fn test_active_to_completed() {
        assert!(StatusMachine::is_valid_transition(
            RideStatus::Active,
            RideStatus::Completed
        ));
    }

    #[test]
    fn test_active_cannot_expire() {
        assert!(!StatusMachine::is_valid_transition(
            RideStatus::Active,
            RideStatus::Expired
        ));
    }

    #[test]
    fn test_active_cannot_cancel_through_this_flow() {
        assert!(!StatusMachine::is_valid_transition(
            RideStatus::Active,
            RideStatus::Cancelled
        ));
    }

    #[test]
    fn test_no_regression_to_scheduled() {
        for from in [
            RideStatus::Active,
            RideStatus::Completed,
            RideStatus::Cancelled,
            RideStatus::Expired,
        ] {
            assert!(!StatusMachine::is_valid_transition(
                from,
                RideStatus::Scheduled
            ));
        }
    }

    #[test]
    fn test_transition_valid() {
        let result = StatusMachine::transition(RideStatus::Scheduled, RideStatus::Active);
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), RideStatus::Active);
    }

    #[test]
    fn test_transition_invalid() {
        let result = StatusMachine::transition(RideStatus::Cancelled, RideStatus::Active);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Invalid status transition"));
    }
}
