//! Travel limit bookkeeping.
//!
//! All four boundaries live in raw units and must keep the ordering
//! `lower_hard <= lower_soft <= upper_soft <= upper_hard`. Hard limits
//! are fixed per device; soft limits are adjustable but every setter
//! re-validates the ordering and refuses the write with the matching
//! violation code, leaving the prior value untouched.

use motion_core::{MotionError, MotionResult, MoveStatus};

/// Raw-unit travel window for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelLimits {
    lower_hard: f64,
    lower_soft: f64,
    upper_soft: f64,
    upper_hard: f64,
}

impl TravelLimits {
    /// Build a limit set, validating the ordering invariant.
    pub fn new(
        lower_hard: f64,
        lower_soft: f64,
        upper_soft: f64,
        upper_hard: f64,
    ) -> MotionResult<Self> {
        if !(lower_hard <= lower_soft && lower_soft <= upper_soft && upper_soft <= upper_hard) {
            return Err(MotionError::Config(format!(
                "travel limits out of order: hard [{lower_hard}, {upper_hard}], \
                 soft [{lower_soft}, {upper_soft}]"
            )));
        }
        Ok(Self {
            lower_hard,
            lower_soft,
            upper_soft,
            upper_hard,
        })
    }

    pub fn lower_hard(&self) -> f64 {
        self.lower_hard
    }

    pub fn lower_soft(&self) -> f64 {
        self.lower_soft
    }

    pub fn upper_soft(&self) -> f64 {
        self.upper_soft
    }

    pub fn upper_hard(&self) -> f64 {
        self.upper_hard
    }

    /// Check a raw destination against the soft window.
    pub fn check(&self, dest_raw: f64) -> MoveStatus {
        if dest_raw < self.lower_soft {
            MoveStatus::DestBelowLowerLimit
        } else if dest_raw > self.upper_soft {
            MoveStatus::DestAboveUpperLimit
        } else {
            MoveStatus::Ok
        }
    }

    /// Move the lower soft limit; refuses values below the lower hard
    /// limit or above the upper soft limit.
    pub fn set_lower_soft(&mut self, raw: f64) -> MoveStatus {
        if raw < self.lower_hard {
            return MoveStatus::DestBelowLowerLimit;
        }
        if raw > self.upper_soft {
            return MoveStatus::DestAboveUpperLimit;
        }
        self.lower_soft = raw;
        MoveStatus::Ok
    }

    /// Move the upper soft limit; refuses values above the upper hard
    /// limit or below the lower soft limit.
    pub fn set_upper_soft(&mut self, raw: f64) -> MoveStatus {
        if raw > self.upper_hard {
            return MoveStatus::DestAboveUpperLimit;
        }
        if raw < self.lower_soft {
            return MoveStatus::DestBelowLowerLimit;
        }
        self.upper_soft = raw;
        MoveStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_enforced_at_construction() {
        assert!(TravelLimits::new(0.0, 10.0, 5.0, 100.0).is_err());
        assert!(TravelLimits::new(0.0, 0.0, 100.0, 50.0).is_err());
        assert!(TravelLimits::new(0.0, 0.0, 100.0, 100.0).is_ok());
    }

    #[test]
    fn test_check_against_soft_window() {
        let limits = TravelLimits::new(-100.0, 0.0, 50.0, 100.0).unwrap();
        assert_eq!(limits.check(25.0), MoveStatus::Ok);
        assert_eq!(limits.check(0.0), MoveStatus::Ok);
        assert_eq!(limits.check(50.0), MoveStatus::Ok);
        assert_eq!(limits.check(-0.1), MoveStatus::DestBelowLowerLimit);
        assert_eq!(limits.check(50.1), MoveStatus::DestAboveUpperLimit);
    }

    #[test]
    fn test_rejected_setter_leaves_value_unchanged() {
        let mut limits = TravelLimits::new(-100.0, 0.0, 50.0, 100.0).unwrap();

        assert_eq!(
            limits.set_lower_soft(-200.0),
            MoveStatus::DestBelowLowerLimit
        );
        assert_eq!(limits.lower_soft(), 0.0);

        assert_eq!(limits.set_upper_soft(150.0), MoveStatus::DestAboveUpperLimit);
        assert_eq!(limits.upper_soft(), 50.0);

        // Soft limits may not cross each other either.
        assert_eq!(limits.set_lower_soft(60.0), MoveStatus::DestAboveUpperLimit);
        assert_eq!(limits.lower_soft(), 0.0);
    }

    #[test]
    fn test_accepted_setter_updates() {
        let mut limits = TravelLimits::new(-100.0, 0.0, 50.0, 100.0).unwrap();
        assert_eq!(limits.set_upper_soft(80.0), MoveStatus::Ok);
        assert_eq!(limits.upper_soft(), 80.0);
        assert_eq!(limits.set_lower_soft(-100.0), MoveStatus::Ok);
        assert_eq!(limits.lower_soft(), -100.0);
    }
}
