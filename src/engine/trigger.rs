//! The per-condition trigger state machine.
//!
//! Each condition moves between three effective states: clear, triggered
//! but pending (grace period running), and triggered with the notification
//! dispatched. `evaluate` is a pure function of the condition
//! configuration, the prior state, the current snapshot, and the clock; the
//! poller owns persistence and dispatch.

use chrono::{DateTime, Utc};

use crate::models::{
    condition::MILESTONE_UPTIME_HOURS, Condition, RelaySnapshot, TriggerState, VersionStatus,
    VersionStrictness,
};

/// The outcome of evaluating one condition against one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// The trigger state after this sample.
    pub state: TriggerState,
    /// Whether a notification must be dispatched for this transition.
    pub notify: bool,
}

impl Evaluation {
    fn unchanged(state: &TriggerState) -> Self {
        Self { state: state.clone(), notify: false }
    }
}

/// Evaluates one condition against the current snapshot.
///
/// The caller folds the sample into the state's derived metrics first (see
/// [`aggregator`](crate::engine::aggregator)); this function only decides
/// transitions and whether to notify. Conditions for the same watcher are
/// independent: no evaluation here reads or writes another condition's
/// state.
pub fn evaluate(
    condition: &Condition,
    state: &TriggerState,
    snapshot: &RelaySnapshot,
    now: DateTime<Utc>,
) -> Evaluation {
    match condition {
        Condition::NodeDown { grace_period_hours } => {
            evaluate_node_down(state, snapshot.up, *grace_period_hours, now)
        }
        Condition::Version { strictness } => {
            let out_of_date = match (*strictness, snapshot.version) {
                (VersionStrictness::Unrecommended, VersionStatus::Unrecommended) => true,
                (_, VersionStatus::Obsolete) => true,
                _ => false,
            };
            evaluate_latched(state, out_of_date, now)
        }
        Condition::LowBandwidth { threshold_kbps } => {
            let starved = state.avg_bandwidth_kbps < *threshold_kbps as f64;
            evaluate_latched(state, starved, now)
        }
        Condition::Milestone => evaluate_milestone(state, snapshot, now),
    }
}

/// Node-down: arm on the first down sample, notify once the grace period
/// has elapsed, clear silently on recovery.
fn evaluate_node_down(
    state: &TriggerState,
    up: bool,
    grace_period_hours: u32,
    now: DateTime<Utc>,
) -> Evaluation {
    if up {
        if state.triggered {
            let mut next = state.clone();
            next.triggered = false;
            next.notified = false;
            next.last_changed = now;
            return Evaluation { state: next, notify: false };
        }
        return Evaluation::unchanged(state);
    }

    if !state.triggered {
        let mut next = state.clone();
        next.triggered = true;
        next.notified = false;
        next.last_changed = now;
        return Evaluation { state: next, notify: false };
    }

    // Grace is measured against wall-clock time since the down transition,
    // so a missed poll cannot delay eligibility.
    if !state.notified && state.hours_since_changed(now) >= grace_period_hours as f64 {
        let mut next = state.clone();
        next.notified = true;
        return Evaluation { state: next, notify: true };
    }

    Evaluation::unchanged(state)
}

/// Shared semantics for the no-grace conditions (version, low bandwidth):
/// notify on the clear-to-triggered edge, latch until the condition stops
/// holding, clear silently.
fn evaluate_latched(state: &TriggerState, active: bool, now: DateTime<Utc>) -> Evaluation {
    if active {
        if !state.triggered {
            let mut next = state.clone();
            next.triggered = true;
            next.notified = true;
            next.last_changed = now;
            return Evaluation { state: next, notify: true };
        }
        // A triggered-but-unnotified row can only come from an interrupted
        // earlier run; dispatch now rather than staying silent forever.
        if !state.notified {
            let mut next = state.clone();
            next.notified = true;
            return Evaluation { state: next, notify: true };
        }
        return Evaluation::unchanged(state);
    }

    if state.triggered {
        let mut next = state.clone();
        next.triggered = false;
        next.notified = false;
        next.last_changed = now;
        return Evaluation { state: next, notify: false };
    }

    Evaluation::unchanged(state)
}

/// Milestone: fires once sustained uptime and average bandwidth both clear
/// their thresholds, and then never re-arms. The reward was earned; a later
/// bandwidth dip does not take it back.
fn evaluate_milestone(
    state: &TriggerState,
    snapshot: &RelaySnapshot,
    now: DateTime<Utc>,
) -> Evaluation {
    if state.notified {
        return Evaluation::unchanged(state);
    }

    let floor = Condition::milestone_floor_kbps(snapshot.exit_capable);
    let earned =
        state.uptime_hours >= MILESTONE_UPTIME_HOURS && state.avg_bandwidth_kbps >= floor;

    if earned {
        let mut next = state.clone();
        next.triggered = true;
        next.notified = true;
        next.last_changed = now;
        return Evaluation { state: next, notify: true };
    }

    Evaluation::unchanged(state)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn snapshot(up: bool) -> RelaySnapshot {
        RelaySnapshot {
            up,
            version: VersionStatus::Recommended,
            observed_bandwidth_kbps: 500.0,
            exit_capable: false,
            stable: true,
            contact: None,
        }
    }

    fn state_at(now: DateTime<Utc>) -> TriggerState {
        TriggerState::new(now)
    }

    #[test]
    fn node_down_arms_without_notifying() {
        let now = Utc::now();
        let condition = Condition::NodeDown { grace_period_hours: 2 };
        let eval = evaluate(&condition, &state_at(now), &snapshot(false), now);

        assert!(eval.state.triggered);
        assert!(!eval.state.notified);
        assert!(!eval.notify);
        assert_eq!(eval.state.last_changed, now);
    }

    #[test]
    fn node_down_notifies_once_grace_elapses() {
        let now = Utc::now();
        let condition = Condition::NodeDown { grace_period_hours: 2 };

        let mut state = state_at(now - Duration::hours(3));
        state.triggered = true;

        let eval = evaluate(&condition, &state, &snapshot(false), now);
        assert!(eval.notify);
        assert!(eval.state.notified);
        // last_changed marks the down transition, not the notification.
        assert_eq!(eval.state.last_changed, now - Duration::hours(3));
    }

    #[test]
    fn node_down_within_grace_stays_pending() {
        let now = Utc::now();
        let condition = Condition::NodeDown { grace_period_hours: 4 };

        let mut state = state_at(now - Duration::hours(1));
        state.triggered = true;

        let eval = evaluate(&condition, &state, &snapshot(false), now);
        assert!(!eval.notify);
        assert!(!eval.state.notified);
    }

    #[test]
    fn node_down_never_notifies_twice_for_one_episode() {
        let now = Utc::now();
        let condition = Condition::NodeDown { grace_period_hours: 1 };

        let mut state = state_at(now - Duration::hours(5));
        state.triggered = true;
        state.notified = true;

        for _ in 0..10 {
            let eval = evaluate(&condition, &state, &snapshot(false), now);
            assert!(!eval.notify);
            state = eval.state;
        }
    }

    #[test]
    fn node_down_recovery_clears_silently() {
        let now = Utc::now();
        let condition = Condition::NodeDown { grace_period_hours: 1 };

        let mut state = state_at(now - Duration::hours(5));
        state.triggered = true;
        state.notified = true;

        let eval = evaluate(&condition, &state, &snapshot(true), now);
        assert!(!eval.notify);
        assert!(!eval.state.triggered);
        assert!(!eval.state.notified);
        assert_eq!(eval.state.last_changed, now);
    }

    #[test]
    fn node_down_grace_uses_elapsed_time_not_poll_count() {
        // One poll, ten hours after the down transition, with a one-hour
        // grace period: immediately eligible.
        let now = Utc::now();
        let condition = Condition::NodeDown { grace_period_hours: 1 };

        let mut state = state_at(now - Duration::hours(10));
        state.triggered = true;

        let eval = evaluate(&condition, &state, &snapshot(false), now);
        assert!(eval.notify);
    }

    #[test]
    fn version_notifies_on_edge_and_latches() {
        let now = Utc::now();
        let condition = Condition::Version { strictness: VersionStrictness::Unrecommended };
        let mut snap = snapshot(true);
        snap.version = VersionStatus::Unrecommended;

        let eval = evaluate(&condition, &state_at(now), &snap, now);
        assert!(eval.notify);
        assert!(eval.state.triggered && eval.state.notified);

        let again = evaluate(&condition, &eval.state, &snap, now);
        assert!(!again.notify);
    }

    #[test]
    fn version_obsolete_strictness_ignores_unrecommended() {
        let now = Utc::now();
        let condition = Condition::Version { strictness: VersionStrictness::Obsolete };
        let mut snap = snapshot(true);
        snap.version = VersionStatus::Unrecommended;

        let eval = evaluate(&condition, &state_at(now), &snap, now);
        assert!(!eval.notify);

        snap.version = VersionStatus::Obsolete;
        let eval = evaluate(&condition, &state_at(now), &snap, now);
        assert!(eval.notify);
    }

    #[test]
    fn version_clears_when_release_becomes_compliant() {
        let now = Utc::now();
        let condition = Condition::Version { strictness: VersionStrictness::Unrecommended };

        let mut state = state_at(now - Duration::hours(1));
        state.triggered = true;
        state.notified = true;

        let eval = evaluate(&condition, &state, &snapshot(true), now);
        assert!(!eval.notify);
        assert!(!eval.state.triggered);
        assert!(!eval.state.notified);
    }

    #[test]
    fn low_bandwidth_compares_running_average() {
        let now = Utc::now();
        let condition = Condition::LowBandwidth { threshold_kbps: 50 };

        let mut state = state_at(now);
        state.avg_bandwidth_kbps = 49.9;
        let eval = evaluate(&condition, &state, &snapshot(true), now);
        assert!(eval.notify);

        let mut state = state_at(now);
        state.avg_bandwidth_kbps = 50.0;
        let eval = evaluate(&condition, &state, &snapshot(true), now);
        assert!(!eval.notify);
    }

    #[test]
    fn milestone_requires_both_thresholds() {
        let now = Utc::now();
        let condition = Condition::Milestone;

        let mut state = state_at(now);
        state.uptime_hours = MILESTONE_UPTIME_HOURS;
        state.avg_bandwidth_kbps = 499.0;
        let eval = evaluate(&condition, &state, &snapshot(true), now);
        assert!(!eval.notify);

        state.avg_bandwidth_kbps = 500.0;
        let eval = evaluate(&condition, &state, &snapshot(true), now);
        assert!(eval.notify);
        assert!(eval.state.notified);
    }

    #[test]
    fn milestone_floor_is_lower_for_exit_relays() {
        let now = Utc::now();
        let condition = Condition::Milestone;
        let mut snap = snapshot(true);
        snap.exit_capable = true;

        let mut state = state_at(now);
        state.uptime_hours = MILESTONE_UPTIME_HOURS + 1.0;
        state.avg_bandwidth_kbps = 100.0;

        let eval = evaluate(&condition, &state, &snap, now);
        assert!(eval.notify);
    }

    #[test]
    fn milestone_notified_is_terminal() {
        let now = Utc::now();
        let condition = Condition::Milestone;

        let mut state = state_at(now);
        state.triggered = true;
        state.notified = true;
        // Bandwidth later collapses below the floor; the reward stays.
        state.uptime_hours = 0.0;
        state.avg_bandwidth_kbps = 0.0;

        let eval = evaluate(&condition, &state, &snapshot(false), now);
        assert!(!eval.notify);
        assert!(eval.state.notified);
    }
}
