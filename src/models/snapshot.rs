//! Live status data returned by a [`StatusSource`](crate::providers::traits::StatusSource).

use serde::{Deserialize, Serialize};

/// Classification of the software release a relay reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    /// The most recent stable release or a newer pre-release.
    Recommended,
    /// Older than the current stable release but still in a recommended
    /// set.
    Unrecommended,
    /// Outside every recommended set.
    Obsolete,
}

/// One fingerprint/nickname pair from the directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayListing {
    /// The relay's fingerprint.
    pub fingerprint: String,
    /// The relay's self-reported nickname, if any.
    pub nickname: Option<String>,
}

/// A point-in-time status snapshot for a single relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaySnapshot {
    /// Whether the relay is currently reachable.
    pub up: bool,

    /// Classification of the software release the relay reports.
    pub version: VersionStatus,

    /// Observed bandwidth from the latest descriptor, in KB/s.
    pub observed_bandwidth_kbps: f64,

    /// Whether the relay permits exit traffic.
    pub exit_capable: bool,

    /// Whether the directory flags the relay as stable.
    pub stable: bool,

    /// Operator contact address parsed from the descriptor, if one is
    /// published.
    pub contact: Option<String>,
}
