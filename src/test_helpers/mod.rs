//! Builders and fixtures shared by unit and integration tests.

use std::time::Duration;

use chrono::{DateTime, Utc};
use url::Url;

use crate::{
    config::{AppConfig, DirectoryClientConfig, DirectoryRetryConfig, SmtpConfig},
    models::{
        watcher::ConditionEntry, Condition, Relay, RelaySnapshot, TriggerState, VersionStatus,
        Watcher,
    },
};

/// An `AppConfig` suitable for tests: in-memory database, zero jitter, and
/// the default retry/retention settings.
pub fn test_app_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        directory_url: Url::parse("http://localhost:9030").expect("static test URL"),
        poll_interval_secs: Duration::from_secs(3600),
        poll_jitter_secs: Duration::ZERO,
        concurrency: 4,
        write_retries: 3,
        relay_retention_days: 365,
        shutdown_timeout_secs: Duration::from_secs(5),
        notification_channel_capacity: 64,
        notifier_workers: 2,
        web_base_url: "https://watch.example.net".to_string(),
        directory_client: DirectoryClientConfig::default(),
        directory_retry: DirectoryRetryConfig::default(),
        smtp: SmtpConfig::default(),
    }
}

/// Builder for [`Relay`] fixtures.
pub struct RelayBuilder {
    relay: Relay,
}

impl RelayBuilder {
    /// A relay first observed now, up, non-exit, not yet greeted.
    pub fn new(fingerprint: &str) -> Self {
        Self { relay: Relay::observed(fingerprint.to_string(), None, Utc::now()) }
    }

    /// Sets the nickname.
    pub fn nickname(mut self, nickname: &str) -> Self {
        self.relay.nickname = Some(nickname.to_string());
        self
    }

    /// Sets the reachability flag.
    pub fn up(mut self, up: bool) -> Self {
        self.relay.up = up;
        self
    }

    /// Sets the exit flag.
    pub fn exit_capable(mut self, exit_capable: bool) -> Self {
        self.relay.exit_capable = exit_capable;
        self
    }

    /// Sets the greeting latch.
    pub fn welcomed(mut self, welcomed: bool) -> Self {
        self.relay.welcomed = welcomed;
        self
    }

    /// Sets when the relay was last successfully sampled.
    pub fn last_sampled_at(mut self, at: DateTime<Utc>) -> Self {
        self.relay.last_sampled_at = Some(at);
        self
    }

    /// Finishes the fixture.
    pub fn build(self) -> Relay {
        self.relay
    }
}

/// Builder for [`Watcher`] fixtures.
pub struct WatcherBuilder {
    watcher: Watcher,
}

impl WatcherBuilder {
    /// A confirmed watcher of the given relay.
    pub fn new(relay_fingerprint: &str) -> Self {
        Self {
            watcher: Watcher {
                watcher_id: 1,
                relay_fingerprint: relay_fingerprint.to_string(),
                email: "watcher@example.net".to_string(),
                confirmed: true,
                unsubscribe_token: "unsub-token".to_string(),
                preferences_token: "pref-token".to_string(),
                created_at: Utc::now(),
            },
        }
    }

    /// Sets the watcher id.
    pub fn watcher_id(mut self, watcher_id: i64) -> Self {
        self.watcher.watcher_id = watcher_id;
        self
    }

    /// Sets the email address.
    pub fn email(mut self, email: &str) -> Self {
        self.watcher.email = email.to_string();
        self
    }

    /// Sets the confirmation flag.
    pub fn confirmed(mut self, confirmed: bool) -> Self {
        self.watcher.confirmed = confirmed;
        self
    }

    /// Finishes the fixture.
    pub fn build(self) -> Watcher {
        self.watcher
    }
}

/// Builder for [`RelaySnapshot`] fixtures.
pub struct SnapshotBuilder {
    snapshot: RelaySnapshot,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    /// An up, recommended-release, 500 KB/s, non-exit snapshot.
    pub fn new() -> Self {
        Self {
            snapshot: RelaySnapshot {
                up: true,
                version: VersionStatus::Recommended,
                observed_bandwidth_kbps: 500.0,
                exit_capable: false,
                stable: false,
                contact: None,
            },
        }
    }

    /// Sets reachability.
    pub fn up(mut self, up: bool) -> Self {
        self.snapshot.up = up;
        self
    }

    /// Sets the release classification.
    pub fn version(mut self, version: VersionStatus) -> Self {
        self.snapshot.version = version;
        self
    }

    /// Sets the observed bandwidth in KB/s.
    pub fn bandwidth_kbps(mut self, bandwidth: f64) -> Self {
        self.snapshot.observed_bandwidth_kbps = bandwidth;
        self
    }

    /// Sets the exit flag.
    pub fn exit_capable(mut self, exit_capable: bool) -> Self {
        self.snapshot.exit_capable = exit_capable;
        self
    }

    /// Sets the stability flag.
    pub fn stable(mut self, stable: bool) -> Self {
        self.snapshot.stable = stable;
        self
    }

    /// Sets the operator contact address.
    pub fn contact(mut self, contact: &str) -> Self {
        self.snapshot.contact = Some(contact.to_string());
        self
    }

    /// Finishes the fixture.
    pub fn build(self) -> RelaySnapshot {
        self.snapshot
    }
}

/// Builder for [`ConditionEntry`] fixtures.
pub struct ConditionEntryBuilder {
    entry: ConditionEntry,
}

impl ConditionEntryBuilder {
    /// An entry for the given condition with a fresh clear state.
    pub fn new(condition: Condition) -> Self {
        Self {
            entry: ConditionEntry { condition_id: 1, condition, state: TriggerState::new(Utc::now()) },
        }
    }

    /// Sets the condition id.
    pub fn condition_id(mut self, condition_id: i64) -> Self {
        self.entry.condition_id = condition_id;
        self
    }

    /// Sets the trigger state.
    pub fn state(mut self, state: TriggerState) -> Self {
        self.entry.state = state;
        self
    }

    /// Finishes the fixture.
    pub fn build(self) -> ConditionEntry {
        self.entry
    }
}
