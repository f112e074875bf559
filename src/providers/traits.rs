//! This module defines the interface for fetching live relay status.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::models::{RelayListing, RelaySnapshot};

/// Custom error type for status source operations.
#[derive(Error, Debug)]
pub enum StatusSourceError {
    /// A directory request failed after exhausting retries.
    #[error("Directory request failed: {0}")]
    Request(#[from] reqwest_middleware::Error),

    /// The HTTP client failed to build a request or decode a response.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The directory answered with an unexpected HTTP status.
    #[error("Directory returned status {0}")]
    Status(reqwest::StatusCode),
}

/// A source of live relay status data.
///
/// The handle is constructed once at startup and passed explicitly to the
/// poller; it is the only component that talks to the network besides the
/// notifier.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Enumerates the fleet: every relay currently present in the
    /// directory, as fingerprint/nickname pairs.
    async fn list_relays(&self) -> Result<Vec<RelayListing>, StatusSourceError>;

    /// Fetches the current snapshot for one relay. `Ok(None)` means the
    /// status is unknown this cycle; the caller must skip the relay without
    /// touching its trigger state.
    async fn snapshot(&self, fingerprint: &str)
        -> Result<Option<RelaySnapshot>, StatusSourceError>;
}
