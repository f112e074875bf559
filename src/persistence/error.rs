//! Error taxonomy for the watch repository.

use thiserror::Error;

/// Errors surfaced while reading or writing relays, watchers, or trigger
/// state.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The backing database rejected a query or transaction.
    #[error("A data store operation failed: {0}")]
    OperationFailed(String),

    /// Stored condition parameters could not be encoded or decoded.
    #[error("Condition parameters failed to (de)serialize: {0}")]
    SerializationError(String),

    /// The schema migrations could not be applied.
    #[error("Schema migration failed: {0}")]
    MigrationError(String),

    /// The caller supplied an inadmissible value (bad database URL,
    /// out-of-bounds condition parameters, unsupported pragma mode).
    #[error("Invalid repository input: {0}")]
    InvalidInput(String),
}
