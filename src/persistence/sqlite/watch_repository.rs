//! Implementation of the WatchRepository trait for SqliteWatchRepository,
//! plus the narrow write surface used by the registration subsystem.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::{
    models::{
        Condition, ConditionEntry, Relay, RelayListing, TriggerState, WatchEntry, Watcher,
    },
    persistence::{error::PersistenceError, sqlite::SqliteWatchRepository, traits::WatchRepository},
};

// Helper struct for mapping the joined watcher/condition/state rows.
#[derive(FromRow)]
struct WatchEntryRow {
    watcher_id: i64,
    relay_fingerprint: String,
    email: String,
    confirmed: bool,
    unsubscribe_token: String,
    preferences_token: String,
    created_at: DateTime<Utc>,
    condition_id: i64,
    params: String,
    triggered: Option<bool>,
    notified: Option<bool>,
    last_changed: Option<DateTime<Utc>>,
    uptime_hours: Option<f64>,
    avg_bandwidth_kbps: Option<f64>,
}

impl WatchEntryRow {
    fn watcher(&self) -> Watcher {
        Watcher {
            watcher_id: self.watcher_id,
            relay_fingerprint: self.relay_fingerprint.clone(),
            email: self.email.clone(),
            confirmed: self.confirmed,
            unsubscribe_token: self.unsubscribe_token.clone(),
            preferences_token: self.preferences_token.clone(),
            created_at: self.created_at,
        }
    }

    fn state(&self, now: DateTime<Utc>) -> TriggerState {
        match (self.triggered, self.notified, self.last_changed) {
            (Some(triggered), Some(notified), Some(last_changed)) => TriggerState {
                triggered,
                notified,
                last_changed,
                uptime_hours: self.uptime_hours.unwrap_or(0.0),
                avg_bandwidth_kbps: self.avg_bandwidth_kbps.unwrap_or(0.0),
            },
            // A condition row without state yet; starts clear.
            _ => TriggerState::new(now),
        }
    }
}

#[async_trait]
impl WatchRepository for SqliteWatchRepository {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn list_watch_entries(&self) -> Result<Vec<WatchEntry>, PersistenceError> {
        let rows: Vec<WatchEntryRow> = sqlx::query_as(
            r#"
            SELECT
                w.watcher_id, w.relay_fingerprint, w.email, w.confirmed,
                w.unsubscribe_token, w.preferences_token, w.created_at,
                c.condition_id, c.params,
                t.triggered, t.notified, t.last_changed,
                t.uptime_hours, t.avg_bandwidth_kbps
            FROM watchers w
            JOIN conditions c ON c.watcher_id = w.watcher_id
            LEFT JOIN trigger_states t ON t.condition_id = c.condition_id
            WHERE w.confirmed = 1
            ORDER BY w.watcher_id, c.condition_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;

        let now = Utc::now();
        let mut entries: Vec<WatchEntry> = Vec::new();
        for row in rows {
            let condition = match serde_json::from_str::<Condition>(&row.params)
                .map_err(Into::into)
                .and_then(|c: Condition| c.validate().map(|_| c))
            {
                Ok(condition) => condition,
                Err(error) => {
                    // Configuration rows are admitted elsewhere; a bad row
                    // here is skipped rather than failing the whole pass.
                    tracing::warn!(
                        error = %error,
                        watcher_id = row.watcher_id,
                        condition_id = row.condition_id,
                        "Skipping condition with invalid stored parameters."
                    );
                    continue;
                }
            };

            let entry = ConditionEntry {
                condition_id: row.condition_id,
                condition,
                state: row.state(now),
            };

            match entries.last_mut() {
                Some(last) if last.watcher.watcher_id == row.watcher_id => {
                    last.conditions.push(entry);
                }
                _ => entries.push(WatchEntry { watcher: row.watcher(), conditions: vec![entry] }),
            }
        }

        tracing::debug!(count = entries.len(), "Loaded confirmed watch entries.");
        Ok(entries)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_relay(&self, fingerprint: &str) -> Result<Option<Relay>, PersistenceError> {
        sqlx::query_as::<_, Relay>(
            r#"
            SELECT fingerprint, nickname, up, exit_capable, welcomed,
                   last_seen, last_sampled_at
            FROM relays
            WHERE fingerprint = ?
            "#,
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistenceError::OperationFailed(e.to_string()))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn mark_all_relays_down(&self) -> Result<(), PersistenceError> {
        sqlx::query("UPDATE relays SET up = 0")
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, listing), level = "debug")]
    async fn upsert_listed_relay(
        &self,
        listing: &RelayListing,
        now: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO relays (fingerprint, nickname, up, exit_capable, welcomed, last_seen)
            VALUES (?, ?, 1, 0, 0, ?)
            ON CONFLICT (fingerprint) DO UPDATE SET
                nickname = excluded.nickname,
                up = 1,
                last_seen = excluded.last_seen
            "#,
        )
        .bind(&listing.fingerprint)
        .bind(&listing.nickname)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn purge_stale_relays(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM relays WHERE last_seen < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;

        let purged = result.rows_affected();
        if purged > 0 {
            tracing::info!(purged, "Purged relays not seen within the retention period.");
        }
        Ok(purged)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn record_sample(
        &self,
        fingerprint: &str,
        up: bool,
        exit_capable: bool,
        sampled_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            "UPDATE relays SET up = ?, exit_capable = ?, last_sampled_at = ? WHERE fingerprint = ?",
        )
        .bind(up)
        .bind(exit_capable)
        .bind(sampled_at)
        .bind(fingerprint)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn mark_welcomed(&self, fingerprint: &str) -> Result<(), PersistenceError> {
        sqlx::query("UPDATE relays SET welcomed = 1 WHERE fingerprint = ?")
            .bind(fingerprint)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, updates), level = "debug")]
    async fn save_trigger_states(
        &self,
        updates: &[(i64, TriggerState)],
    ) -> Result<(), PersistenceError> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;

        for (condition_id, state) in updates {
            // The EXISTS guard silently drops state for a condition the
            // registration subsystem deleted mid-cycle.
            sqlx::query(
                r#"
                INSERT INTO trigger_states
                    (condition_id, triggered, notified, last_changed,
                     uptime_hours, avg_bandwidth_kbps)
                SELECT ?, ?, ?, ?, ?, ?
                WHERE EXISTS (SELECT 1 FROM conditions WHERE condition_id = ?)
                ON CONFLICT (condition_id) DO UPDATE SET
                    triggered = excluded.triggered,
                    notified = excluded.notified,
                    last_changed = excluded.last_changed,
                    uptime_hours = excluded.uptime_hours,
                    avg_bandwidth_kbps = excluded.avg_bandwidth_kbps
                "#,
            )
            .bind(condition_id)
            .bind(state.triggered)
            .bind(state.notified)
            .bind(state.last_changed)
            .bind(state.uptime_hours)
            .bind(state.avg_bandwidth_kbps)
            .bind(condition_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;
        tracing::debug!(count = updates.len(), "Persisted trigger state batch.");
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn flush(&self) -> Result<(), PersistenceError> {
        self.set_synchronous_mode("FULL").await?;
        self.checkpoint_wal().await?;
        self.set_synchronous_mode("NORMAL").await?;
        tracing::debug!("Pending writes flushed to disk.");
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn cleanup(&self) -> Result<(), PersistenceError> {
        self.checkpoint_wal().await?;
        tracing::debug!("Repository cleanup completed.");
        Ok(())
    }
}

/// The registration-side write surface. These methods validate condition
/// bounds at admission time so out-of-range parameters never reach the
/// poll cycle.
impl SqliteWatchRepository {
    /// Registers a watcher for a relay. The relay row must already exist
    /// (relays are created by the poll cycle or by an explicit upsert).
    pub async fn add_watcher(
        &self,
        relay_fingerprint: &str,
        email: &str,
        confirmed: bool,
        unsubscribe_token: &str,
        preferences_token: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, PersistenceError> {
        let result = sqlx::query(
            r#"
            INSERT INTO watchers
                (relay_fingerprint, email, confirmed,
                 unsubscribe_token, preferences_token, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(relay_fingerprint)
        .bind(email)
        .bind(confirmed)
        .bind(unsubscribe_token)
        .bind(preferences_token)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    /// Enables a condition on a watcher, creating its initial clear trigger
    /// state alongside it.
    pub async fn add_condition(
        &self,
        watcher_id: i64,
        condition: &Condition,
        now: DateTime<Utc>,
    ) -> Result<i64, PersistenceError> {
        condition.validate().map_err(|e| PersistenceError::InvalidInput(e.to_string()))?;

        let params = serde_json::to_string(condition)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO conditions (watcher_id, kind, params) VALUES (?, ?, ?)",
        )
        .bind(watcher_id)
        .bind(condition.kind_str())
        .bind(&params)
        .execute(&mut *tx)
        .await
        .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;

        let condition_id = result.last_insert_rowid();
        let state = TriggerState::new(now);
        sqlx::query(
            r#"
            INSERT INTO trigger_states
                (condition_id, triggered, notified, last_changed,
                 uptime_hours, avg_bandwidth_kbps)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(condition_id)
        .bind(state.triggered)
        .bind(state.notified)
        .bind(state.last_changed)
        .bind(state.uptime_hours)
        .bind(state.avg_bandwidth_kbps)
        .execute(&mut *tx)
        .await
        .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;

        tx.commit().await.map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;
        Ok(condition_id)
    }

    /// Removes a watcher and, via cascade, its conditions and trigger
    /// state.
    pub async fn remove_watcher(&self, watcher_id: i64) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM watchers WHERE watcher_id = ?")
            .bind(watcher_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;
        Ok(())
    }
}
