//! SQLite-backed implementation of the watch repository.

use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

mod watch_repository;

use crate::persistence::error::PersistenceError;

/// Stores relays, watchers, conditions, and trigger state in SQLite.
pub struct SqliteWatchRepository {
    pool: SqlitePool,
}

impl SqliteWatchRepository {
    /// Opens the database at `database_url`, creating the file if it does
    /// not exist yet. Foreign keys are enabled so purging a relay cascades
    /// through its watchers and their trigger state.
    #[tracing::instrument(level = "info")]
    pub async fn new(database_url: &str) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| PersistenceError::InvalidInput(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database exists per connection; cap the pool so
        // every query sees the same one.
        let mut pool_options = SqlitePoolOptions::new();
        if database_url.contains(":memory:") {
            pool_options = pool_options.max_connections(1);
        }

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            PersistenceError::OperationFailed(format!("could not open watch database: {e}"))
        })?;
        tracing::info!(database_url, "Watch database opened.");
        Ok(Self { pool })
    }

    /// Applies any pending schema migrations.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Schema migration failed.");
            PersistenceError::MigrationError(e.to_string())
        })?;
        tracing::info!("Schema is up to date.");
        Ok(())
    }

    /// The underlying connection pool, for callers that need raw queries
    /// (tests, mostly).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the connection pool gracefully.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Watch database closed.");
    }

    async fn pragma(&self, statement: &str) -> Result<(), PersistenceError> {
        sqlx::query(statement).execute(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, statement, "PRAGMA failed.");
            PersistenceError::OperationFailed(e.to_string())
        })?;
        Ok(())
    }

    /// Truncates the write-ahead log back into the main database file.
    pub(crate) async fn checkpoint_wal(&self) -> Result<(), PersistenceError> {
        self.pragma("PRAGMA wal_checkpoint(TRUNCATE)").await
    }

    /// Adjusts how eagerly SQLite fsyncs. `FULL` brackets the final flush
    /// on shutdown; `NORMAL` is the running default.
    pub(crate) async fn set_synchronous_mode(&self, mode: &str) -> Result<(), PersistenceError> {
        match mode {
            "OFF" | "NORMAL" | "FULL" => {
                self.pragma(&format!("PRAGMA synchronous = {mode}")).await
            }
            other => Err(PersistenceError::InvalidInput(format!(
                "unsupported synchronous mode: {other}"
            ))),
        }
    }
}
