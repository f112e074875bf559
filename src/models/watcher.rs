//! Watcher registrations and the composite rows the poll cycle evaluates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{Condition, TriggerState};

/// A registered interest in one relay's status.
///
/// Rows are created and mutated by the registration subsystem; the poll
/// cycle reads them and never writes back any of these fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Watcher {
    /// Repository identifier.
    pub watcher_id: i64,

    /// Fingerprint of the watched relay.
    pub relay_fingerprint: String,

    /// Where notifications go.
    pub email: String,

    /// Whether the watcher followed the confirmation link. Unconfirmed
    /// watchers are never evaluated.
    pub confirmed: bool,

    /// Unguessable token embedded in unsubscribe links.
    pub unsubscribe_token: String,

    /// Unguessable token embedded in preference-management links.
    pub preferences_token: String,

    /// When the registration was created.
    pub created_at: DateTime<Utc>,
}

/// One enabled condition together with its trigger bookkeeping.
#[derive(Debug, Clone)]
pub struct ConditionEntry {
    /// Repository identifier of the condition row.
    pub condition_id: i64,
    /// The condition configuration (read-only to the poll cycle).
    pub condition: Condition,
    /// The mutable trigger state.
    pub state: TriggerState,
}

/// A confirmed watcher with all of its enabled conditions, as loaded for
/// one evaluation pass.
#[derive(Debug, Clone)]
pub struct WatchEntry {
    /// The watcher registration.
    pub watcher: Watcher,
    /// The watcher's enabled conditions and their trigger state.
    pub conditions: Vec<ConditionEntry>,
}
