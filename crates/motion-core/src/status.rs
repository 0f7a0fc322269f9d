//! Move status codes.
//!
//! A soft-limit rejection is an expected outcome of normal operation, so
//! it is carried as a status code rather than an error. The same codes
//! are returned by the soft-limit setters when a requested limit would
//! violate the hard-limit ordering.

use serde::{Deserialize, Serialize};

/// Terminal status of a motion or calibration command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveStatus {
    /// Command completed (or was accepted) normally.
    Ok,
    /// Requested destination lies below the lower soft limit.
    DestBelowLowerLimit,
    /// Requested destination lies above the upper soft limit.
    DestAboveUpperLimit,
}

impl MoveStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, MoveStatus::Ok)
    }

    /// Human-readable name for log messages.
    pub fn name(&self) -> &'static str {
        match self {
            MoveStatus::Ok => "ok",
            MoveStatus::DestBelowLowerLimit => "dest_below_lower_limit",
            MoveStatus::DestAboveUpperLimit => "dest_above_upper_limit",
        }
    }
}

impl std::fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(MoveStatus::Ok.to_string(), "ok");
        assert_eq!(
            MoveStatus::DestAboveUpperLimit.to_string(),
            "dest_above_upper_limit"
        );
        assert!(MoveStatus::Ok.is_ok());
        assert!(!MoveStatus::DestBelowLowerLimit.is_ok());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&MoveStatus::DestBelowLowerLimit).unwrap();
        assert_eq!(json, "\"dest_below_lower_limit\"");
    }
}
