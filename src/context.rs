//! Shared runtime metrics recorded by the poller, used for backpressure
//! decisions and surfaced in logs.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// A struct to hold per-cycle poll statistics.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    /// When the most recent cycle finished.
    pub last_cycle_at: Option<DateTime<Utc>>,
    /// Wall time of the most recent cycle.
    pub last_cycle_duration: Duration,
    /// Relays successfully sampled in the most recent cycle.
    pub relays_sampled: u64,
    /// Relays skipped (unknown status) in the most recent cycle.
    pub relays_skipped: u64,
    /// Notifications enqueued in the most recent cycle.
    pub notifications_enqueued: u64,
    /// Total cycles completed since startup.
    pub cycles_completed: u64,
}

/// Shared poll metrics, cloned into the poller and readable elsewhere.
#[derive(Clone, Default)]
pub struct PollMetrics {
    inner: Arc<RwLock<CycleStats>>,
}

impl PollMetrics {
    /// Records the outcome of a completed cycle.
    pub async fn record_cycle(
        &self,
        duration: Duration,
        relays_sampled: u64,
        relays_skipped: u64,
        notifications_enqueued: u64,
    ) {
        let mut stats = self.inner.write().await;
        stats.last_cycle_at = Some(Utc::now());
        stats.last_cycle_duration = duration;
        stats.relays_sampled = relays_sampled;
        stats.relays_skipped = relays_skipped;
        stats.notifications_enqueued = notifications_enqueued;
        stats.cycles_completed += 1;
    }

    /// Returns a copy of the current statistics.
    pub async fn snapshot(&self) -> CycleStats {
        self.inner.read().await.clone()
    }
}
