//! Data model for relaywatch: relays, watchers, conditions, trigger state,
//! status snapshots, and notification requests.

pub mod condition;
pub mod notification;
pub mod relay;
pub mod snapshot;
pub mod trigger;
pub mod watcher;

pub use condition::{Condition, ConditionError, VersionStrictness};
pub use notification::{NotificationKind, NotificationRequest};
pub use relay::Relay;
pub use snapshot::{RelayListing, RelaySnapshot, VersionStatus};
pub use trigger::TriggerState;
pub use watcher::{ConditionEntry, WatchEntry, Watcher};
