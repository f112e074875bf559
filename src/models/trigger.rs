//! Per-condition trigger bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The mutable trigger bookkeeping for one condition instance.
///
/// Invariant: `notified` implies `triggered`, and a notification has been
/// dispatched for the current contiguous triggered episode. Whenever
/// `triggered` flips in either direction, `notified` resets to `false` and
/// `last_changed` records the transition time. The milestone condition is
/// the exception: its `notified` flag is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TriggerState {
    /// Whether the condition currently holds.
    pub triggered: bool,

    /// Whether a notification has been dispatched for this episode.
    pub notified: bool,

    /// When `triggered` last changed.
    pub last_changed: DateTime<Utc>,

    /// Contiguous uptime accumulated for this condition, in hours. Resets
    /// to zero when the relay goes down.
    pub uptime_hours: f64,

    /// Running average of observed bandwidth over the uptime window, in
    /// KB/s.
    pub avg_bandwidth_kbps: f64,
}

impl TriggerState {
    /// A fresh, clear state created alongside its condition.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            triggered: false,
            notified: false,
            last_changed: now,
            uptime_hours: 0.0,
            avg_bandwidth_kbps: 0.0,
        }
    }

    /// Wall-clock hours since `last_changed`, measured against `now`.
    pub fn hours_since_changed(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_changed).num_seconds().max(0) as f64 / 3600.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn hours_since_changed_uses_wall_clock() {
        let now = Utc::now();
        let mut state = TriggerState::new(now - Duration::hours(10));
        assert!((state.hours_since_changed(now) - 10.0).abs() < 1e-6);

        // A last_changed in the future never yields negative hours.
        state.last_changed = now + Duration::hours(1);
        assert_eq!(state.hours_since_changed(now), 0.0);
    }
}
