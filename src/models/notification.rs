//! Notification requests handed from the poll cycle to the dispatcher.

use serde::{Deserialize, Serialize};

use super::{Relay, Watcher};

/// Which message a notification renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// One-time operator greeting for a newly stable relay.
    Greeting,
    /// The watched relay has been down past its grace period.
    NodeDown,
    /// The watched relay runs an out-of-date release.
    OutdatedVersion,
    /// The watched relay's average bandwidth fell below the threshold.
    LowBandwidth,
    /// The watched relay earned the sustained-uptime reward.
    Milestone,
}

impl NotificationKind {
    /// Stable identifier used in log events.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Greeting => "greeting",
            NotificationKind::NodeDown => "node_down",
            NotificationKind::OutdatedVersion => "outdated_version",
            NotificationKind::LowBandwidth => "low_bandwidth",
            NotificationKind::Milestone => "milestone",
        }
    }
}

/// A fully-specified notification waiting to be rendered and sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Recipient email address.
    pub recipient: String,

    /// Which message to render.
    pub kind: NotificationKind,

    /// Template context: relay identity plus kind-specific values.
    pub context: serde_json::Value,
}

impl NotificationRequest {
    /// Builds the base template context shared by all watcher
    /// notifications: relay identity and the watcher's unsubscribe and
    /// preference links.
    pub fn watcher_context(
        watcher: &Watcher,
        relay: &Relay,
        web_base_url: &str,
    ) -> serde_json::Value {
        serde_json::json!({
            "relay_name": relay.display_name(),
            "fingerprint": relay.spaced_fingerprint(),
            "unsubscribe_url": format!("{}/unsubscribe/{}", web_base_url, watcher.unsubscribe_token),
            "preferences_url": format!("{}/preferences/{}", web_base_url, watcher.preferences_token),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn watcher_context_embeds_token_links() {
        let relay = Relay::observed("ABCD".repeat(10), Some("ham".to_string()), Utc::now());
        let watcher = Watcher {
            watcher_id: 1,
            relay_fingerprint: relay.fingerprint.clone(),
            email: "operator@example.net".to_string(),
            confirmed: true,
            unsubscribe_token: "unsub-token".to_string(),
            preferences_token: "pref-token".to_string(),
            created_at: Utc::now(),
        };

        let context =
            NotificationRequest::watcher_context(&watcher, &relay, "https://watch.example.net");
        assert_eq!(context["relay_name"], "ham");
        assert_eq!(
            context["unsubscribe_url"],
            "https://watch.example.net/unsubscribe/unsub-token"
        );
        assert_eq!(
            context["preferences_url"],
            "https://watch.example.net/preferences/pref-token"
        );
    }
}
