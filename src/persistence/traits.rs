//! The repository interface the poll cycle works against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::{
    models::{Relay, RelayListing, TriggerState, WatchEntry},
    persistence::error::PersistenceError,
};

/// Read/write access to relays, watchers, and trigger state.
///
/// Watcher and condition configuration is owned by the registration
/// subsystem; implementations of this trait only ever write relay snapshot
/// fields and trigger-state rows, so a concurrent registration-side edit is
/// never clobbered.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WatchRepository: Send + Sync {
    /// Loads every confirmed watcher together with its enabled conditions
    /// and their trigger state. Conditions with unparseable or out-of-bounds
    /// parameters are skipped.
    async fn list_watch_entries(&self) -> Result<Vec<WatchEntry>, PersistenceError>;

    /// Fetches a relay by fingerprint.
    async fn get_relay(&self, fingerprint: &str) -> Result<Option<Relay>, PersistenceError>;

    /// Marks every relay as down. Called at the start of a refresh pass;
    /// relays present in the directory listing are marked up again by
    /// [`upsert_listed_relay`](Self::upsert_listed_relay).
    async fn mark_all_relays_down(&self) -> Result<(), PersistenceError>;

    /// Inserts or refreshes a relay from a directory listing entry: marks
    /// it up, updates the nickname, and stamps `last_seen`.
    async fn upsert_listed_relay(
        &self,
        listing: &RelayListing,
        now: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;

    /// Deletes relays not seen since `cutoff`, cascading their watchers and
    /// trigger state. Returns the number of relays purged.
    async fn purge_stale_relays(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError>;

    /// Records a successful status sample for a relay: reachability, exit
    /// flag, and the sample timestamp used for elapsed-time math.
    async fn record_sample(
        &self,
        fingerprint: &str,
        up: bool,
        exit_capable: bool,
        sampled_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;

    /// Latches the one-time operator greeting flag for a relay.
    async fn mark_welcomed(&self, fingerprint: &str) -> Result<(), PersistenceError>;

    /// Persists a batch of trigger states atomically. Used once per relay
    /// per cycle so an abandoned evaluation never leaves half-applied
    /// transitions behind.
    async fn save_trigger_states(
        &self,
        updates: &[(i64, TriggerState)],
    ) -> Result<(), PersistenceError>;

    /// Ensures all pending writes are flushed to disk.
    async fn flush(&self) -> Result<(), PersistenceError>;

    /// Performs any necessary cleanup operations before shutdown.
    async fn cleanup(&self) -> Result<(), PersistenceError>;
}
