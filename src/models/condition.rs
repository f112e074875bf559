//! The `Condition` sum type: one variant per notification rule a watcher can
//! enable, each carrying only its own parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum allowed node-down grace period, in hours.
pub const MIN_GRACE_PERIOD_HOURS: u32 = 1;

/// Maximum allowed node-down grace period, in hours.
pub const MAX_GRACE_PERIOD_HOURS: u32 = 4500;

/// Maximum allowed low-bandwidth threshold, in KB/s.
pub const MAX_BANDWIDTH_THRESHOLD_KBPS: u32 = 100_000;

/// Default low-bandwidth threshold when the registration form leaves it
/// blank, in KB/s.
pub const DEFAULT_BANDWIDTH_THRESHOLD_KBPS: u32 = 20;

/// Continuous uptime required before the milestone reward fires, in hours
/// (61 days).
pub const MILESTONE_UPTIME_HOURS: f64 = 1464.0;

/// Average-bandwidth floor for the milestone reward on exit-capable relays,
/// in KB/s.
pub const MILESTONE_EXIT_FLOOR_KBPS: f64 = 100.0;

/// Average-bandwidth floor for the milestone reward on non-exit relays, in
/// KB/s.
pub const MILESTONE_NON_EXIT_FLOOR_KBPS: f64 = 500.0;

/// How strict a version condition is about the relay's software release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStrictness {
    /// Fire when the relay runs anything outside the recommended set,
    /// including obsolete releases.
    Unrecommended,
    /// Fire only when the relay runs a release outside every recommended
    /// set.
    Obsolete,
}

/// A notification rule enabled on a watcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// Notify once the relay has been unreachable for the grace period.
    NodeDown {
        /// Hours the relay must stay down before the notification fires.
        grace_period_hours: u32,
    },
    /// Notify when the relay's software release is out of date.
    Version {
        /// Which release classifications fire the condition.
        strictness: VersionStrictness,
    },
    /// Notify when the relay's average bandwidth falls below the threshold.
    LowBandwidth {
        /// Threshold in KB/s.
        threshold_kbps: u32,
    },
    /// One-time reward once the relay has sustained uptime and bandwidth.
    Milestone,
}

/// Validation errors for condition parameters.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// The grace period lies outside the admissible range.
    #[error("grace period {0}h outside {MIN_GRACE_PERIOD_HOURS}..={MAX_GRACE_PERIOD_HOURS}")]
    GracePeriodOutOfBounds(u32),

    /// The bandwidth threshold lies outside the admissible range.
    #[error("bandwidth threshold {0} KB/s above {MAX_BANDWIDTH_THRESHOLD_KBPS}")]
    ThresholdOutOfBounds(u32),

    /// The stored condition row could not be decoded.
    #[error("unparseable condition parameters: {0}")]
    Unparseable(#[from] serde_json::Error),
}

impl Condition {
    /// Stable identifier for the condition kind, used as the repository
    /// discriminator column and in log events.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Condition::NodeDown { .. } => "node_down",
            Condition::Version { .. } => "version",
            Condition::LowBandwidth { .. } => "low_bandwidth",
            Condition::Milestone => "milestone",
        }
    }

    /// Checks the kind-specific parameters against the admissible bounds.
    ///
    /// Out-of-bounds rows are rejected at admission time; the repository
    /// re-checks when rows are loaded and skips any that fail.
    pub fn validate(&self) -> Result<(), ConditionError> {
        match *self {
            Condition::NodeDown { grace_period_hours }
                if !(MIN_GRACE_PERIOD_HOURS..=MAX_GRACE_PERIOD_HOURS)
                    .contains(&grace_period_hours) =>
            {
                Err(ConditionError::GracePeriodOutOfBounds(grace_period_hours))
            }
            Condition::LowBandwidth { threshold_kbps }
                if threshold_kbps > MAX_BANDWIDTH_THRESHOLD_KBPS =>
            {
                Err(ConditionError::ThresholdOutOfBounds(threshold_kbps))
            }
            _ => Ok(()),
        }
    }

    /// The milestone average-bandwidth floor for a relay, which depends on
    /// whether it is exit-capable.
    pub fn milestone_floor_kbps(exit_capable: bool) -> f64 {
        if exit_capable {
            MILESTONE_EXIT_FLOOR_KBPS
        } else {
            MILESTONE_NON_EXIT_FLOOR_KBPS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_str_is_stable() {
        assert_eq!(Condition::NodeDown { grace_period_hours: 1 }.kind_str(), "node_down");
        assert_eq!(
            Condition::Version { strictness: VersionStrictness::Obsolete }.kind_str(),
            "version"
        );
        assert_eq!(Condition::LowBandwidth { threshold_kbps: 20 }.kind_str(), "low_bandwidth");
        assert_eq!(Condition::Milestone.kind_str(), "milestone");
    }

    #[test]
    fn validate_rejects_out_of_bounds_grace_period() {
        assert!(Condition::NodeDown { grace_period_hours: 0 }.validate().is_err());
        assert!(Condition::NodeDown { grace_period_hours: 4501 }.validate().is_err());
        assert!(Condition::NodeDown { grace_period_hours: 24 }.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_bounds_threshold() {
        assert!(Condition::LowBandwidth { threshold_kbps: 100_001 }.validate().is_err());
        assert!(Condition::LowBandwidth { threshold_kbps: 0 }.validate().is_ok());
        assert!(Condition::LowBandwidth { threshold_kbps: 100_000 }.validate().is_ok());
    }

    #[test]
    fn condition_round_trips_through_json() {
        let condition = Condition::NodeDown { grace_period_hours: 48 };
        let json = serde_json::to_string(&condition).unwrap();
        assert!(json.contains("node_down"));
        let back: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, condition);
    }

    #[test]
    fn milestone_floor_depends_on_exit_flag() {
        assert_eq!(Condition::milestone_floor_kbps(true), 100.0);
        assert_eq!(Condition::milestone_floor_kbps(false), 500.0);
    }
}
