//! The `Relay` entity: a monitored relay identified by its fingerprint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Placeholder display name for relays that do not publish a nickname.
pub const UNNAMED_PLACEHOLDER: &str = "Unnamed";

/// A monitored relay. Identity is the fingerprint; the remaining fields are
/// snapshot data refreshed each poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Relay {
    /// Stable identifier: a 40-character uppercase hex string.
    pub fingerprint: String,

    /// Self-reported nickname, if the relay publishes one.
    pub nickname: Option<String>,

    /// Whether the relay was reachable at the last refresh.
    pub up: bool,

    /// Whether the relay permits exit traffic.
    pub exit_capable: bool,

    /// Whether the one-time operator greeting has been sent.
    pub welcomed: bool,

    /// When the relay last appeared in a directory listing.
    pub last_seen: DateTime<Utc>,

    /// When a status snapshot was last successfully taken. `None` until the
    /// first successful sample; unknown snapshots do not advance this, so
    /// elapsed-time math spans source outages.
    pub last_sampled_at: Option<DateTime<Utc>>,
}

impl Relay {
    /// Creates a relay record for a fingerprint first observed at `now`.
    pub fn observed(fingerprint: String, nickname: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            fingerprint,
            nickname,
            up: true,
            exit_capable: false,
            welcomed: false,
            last_seen: now,
            last_sampled_at: None,
        }
    }

    /// The nickname, or a placeholder when the relay does not publish one.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(UNNAMED_PLACEHOLDER)
    }

    /// The fingerprint spaced into groups of four characters, the form used
    /// in email bodies.
    pub fn spaced_fingerprint(&self) -> String {
        self.fingerprint
            .as_bytes()
            .chunks(4)
            .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaced_fingerprint_groups_by_four() {
        let relay = Relay::observed("ABCD1234EF567890".to_string(), None, Utc::now());
        assert_eq!(relay.spaced_fingerprint(), "ABCD 1234 EF56 7890");
    }

    #[test]
    fn display_name_falls_back_to_placeholder() {
        let mut relay = Relay::observed("A".repeat(40), None, Utc::now());
        assert_eq!(relay.display_name(), UNNAMED_PLACEHOLDER);
        relay.nickname = Some("ham".to_string());
        assert_eq!(relay.display_name(), "ham");
    }
}
