//! The poll scheduler: periodically samples every watched relay, folds the
//! sample into derived metrics, runs the trigger state machine, persists
//! the outcome, and hands fired notifications to the dispatcher.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::Rng;
use thiserror::Error;
use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    context::PollMetrics,
    engine::{
        aggregator::{self, DerivedMetrics},
        trigger,
    },
    models::{
        Condition, NotificationKind, NotificationRequest, Relay, RelaySnapshot, TriggerState,
        VersionStatus, WatchEntry, Watcher,
    },
    persistence::{error::PersistenceError, traits::WatchRepository},
    providers::traits::{StatusSource, StatusSourceError},
};

/// Errors that abort a whole poll cycle. Per-relay failures are handled
/// inside the cycle and never surface here.
#[derive(Debug, Error)]
pub enum PollCycleError {
    /// The directory listing could not be fetched.
    #[error("Status source error: {0}")]
    Source(#[from] StatusSourceError),

    /// A fleet-wide repository operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] PersistenceError),
}

/// What one completed cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Relays whose snapshot was fetched and evaluated.
    pub relays_sampled: u64,
    /// Relays skipped this cycle (unknown status, missing row, or
    /// discarded after write failures).
    pub relays_skipped: u64,
    /// Notifications handed to the dispatcher.
    pub notifications_enqueued: u64,
    /// Relays purged for falling outside the retention period.
    pub relays_purged: u64,
}

/// Outcome of evaluating a single relay within a cycle.
struct RelayOutcome {
    sampled: bool,
    notifications: u64,
}

impl RelayOutcome {
    fn skipped() -> Self {
        Self { sampled: false, notifications: 0 }
    }
}

/// The poll scheduler service.
///
/// Cycles are strictly sequential: a new cycle starts only after the
/// previous one's fan-out has completed, so backlog cannot grow without
/// bound. Within a cycle, relays are sampled concurrently up to the
/// configured limit, and one slow relay cannot stall the others beyond
/// occupying a single permit.
pub struct StatusPoller<S: StatusSource + ?Sized, R: WatchRepository + ?Sized> {
    /// Shared application configuration.
    config: Arc<AppConfig>,
    /// The source of live relay status.
    source: Arc<S>,
    /// The repository holding relays, watchers, and trigger state.
    repository: Arc<R>,
    /// The sender side of the bounded notification queue.
    notifications_tx: mpsc::Sender<NotificationRequest>,
    /// Shared cycle statistics.
    metrics: PollMetrics,
    /// A token used to signal a graceful shutdown.
    cancellation_token: CancellationToken,
}

impl<S, R> StatusPoller<S, R>
where
    S: StatusSource + ?Sized + 'static,
    R: WatchRepository + ?Sized + 'static,
{
    /// Creates a new StatusPoller instance.
    pub fn new(
        config: Arc<AppConfig>,
        source: Arc<S>,
        repository: Arc<R>,
        notifications_tx: mpsc::Sender<NotificationRequest>,
        metrics: PollMetrics,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self { config, source, repository, notifications_tx, metrics, cancellation_token }
    }

    /// Starts the long-running service loop.
    pub async fn run(self) {
        loop {
            // A random delay ahead of each cycle spreads probe load so a
            // fleet of pollers does not hit the directory in lockstep.
            let pause = self.cycle_jitter();
            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("StatusPoller cancellation signal received, shutting down...");
                    break;
                }

                _ = tokio::time::sleep(pause) => {}
            }

            if self.cancellation_token.is_cancelled() {
                break;
            }

            match self.run_cycle().await {
                Ok(summary) => {
                    tracing::debug!(?summary, "Poll cycle finished.");
                }
                Err(error) => {
                    tracing::error!(error = %error, "Poll cycle failed. Retrying after delay...");
                }
            }

            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("StatusPoller cancellation signal received, shutting down...");
                    break;
                }

                _ = tokio::time::sleep(self.config.poll_interval_secs) => {}
            }
        }
        tracing::info!("StatusPoller has shut down.");
    }

    fn cycle_jitter(&self) -> Duration {
        let max_secs = self.config.poll_jitter_secs.as_secs();
        if max_secs == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs(rand::thread_rng().gen_range(0..=max_secs))
    }

    /// Performs one full poll cycle: fleet refresh, fan-out evaluation,
    /// and metric recording.
    pub async fn run_cycle(&self) -> Result<CycleSummary, PollCycleError> {
        let started = tokio::time::Instant::now();
        let now = Utc::now();

        let relays_purged = self.refresh_fleet(now).await?;

        let entries = self.repository.list_watch_entries().await?;
        let mut by_relay: BTreeMap<String, Vec<WatchEntry>> = BTreeMap::new();
        for entry in entries {
            by_relay.entry(entry.watcher.relay_fingerprint.clone()).or_default().push(entry);
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1) as usize));
        let mut join_set: JoinSet<RelayOutcome> = JoinSet::new();

        for (fingerprint, group) in by_relay {
            let semaphore = Arc::clone(&semaphore);
            let config = Arc::clone(&self.config);
            let source = Arc::clone(&self.source);
            let repository = Arc::clone(&self.repository);
            let notifications_tx = self.notifications_tx.clone();
            let token = self.cancellation_token.clone();

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return RelayOutcome::skipped(),
                };
                process_relay(
                    config,
                    source,
                    repository,
                    notifications_tx,
                    token,
                    fingerprint,
                    group,
                    now,
                )
                .await
            });
        }

        let mut summary = CycleSummary { relays_purged, ..CycleSummary::default() };
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => {
                    if outcome.sampled {
                        summary.relays_sampled += 1;
                    } else {
                        summary.relays_skipped += 1;
                    }
                    summary.notifications_enqueued += outcome.notifications;
                }
                Err(error) => {
                    tracing::error!(error = %error, "Relay evaluation task failed.");
                    summary.relays_skipped += 1;
                }
            }
        }

        let duration = started.elapsed();
        self.metrics
            .record_cycle(
                duration,
                summary.relays_sampled,
                summary.relays_skipped,
                summary.notifications_enqueued,
            )
            .await;
        tracing::info!(
            duration_ms = duration.as_millis() as u64,
            sampled = summary.relays_sampled,
            skipped = summary.relays_skipped,
            notifications = summary.notifications_enqueued,
            purged = summary.relays_purged,
            "Poll cycle complete."
        );
        Ok(summary)
    }

    /// Refreshes the relay table from the directory listing and purges
    /// relays outside the retention period.
    async fn refresh_fleet(&self, now: DateTime<Utc>) -> Result<u64, PollCycleError> {
        let listing = self.source.list_relays().await?;

        self.repository.mark_all_relays_down().await?;
        for relay in &listing {
            self.repository.upsert_listed_relay(relay, now).await?;
        }

        let cutoff = now - chrono::Duration::days(i64::from(self.config.relay_retention_days));
        let purged = self.repository.purge_stale_relays(cutoff).await?;

        tracing::debug!(listed = listing.len(), purged, "Relay table refreshed.");
        Ok(purged)
    }
}

/// Evaluates every condition watching one relay against a fresh snapshot.
///
/// All trigger-state writes for the relay land in a single transactional
/// batch, persisted before any notification is enqueued: if the write
/// ultimately fails, the cycle's results for this relay are discarded and
/// nothing is sent, so a retry next cycle cannot produce a duplicate.
#[allow(clippy::too_many_arguments)]
async fn process_relay<S, R>(
    config: Arc<AppConfig>,
    source: Arc<S>,
    repository: Arc<R>,
    notifications_tx: mpsc::Sender<NotificationRequest>,
    token: CancellationToken,
    fingerprint: String,
    group: Vec<WatchEntry>,
    now: DateTime<Utc>,
) -> RelayOutcome
where
    S: StatusSource + ?Sized,
    R: WatchRepository + ?Sized,
{
    if token.is_cancelled() {
        return RelayOutcome::skipped();
    }

    let relay = match repository.get_relay(&fingerprint).await {
        Ok(Some(relay)) => relay,
        Ok(None) => {
            tracing::warn!(relay = %fingerprint, "Watched relay missing from relay table; skipping.");
            return RelayOutcome::skipped();
        }
        Err(error) => {
            tracing::warn!(error = %error, relay = %fingerprint, "Failed to load relay; skipping.");
            return RelayOutcome::skipped();
        }
    };

    // An unknown snapshot skips the relay entirely: no transitions, no
    // bookkeeping changes. last_sampled_at stays put, so the gap is
    // included in the next successful sample's elapsed time.
    let snapshot = match source.snapshot(&fingerprint).await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            tracing::debug!(relay = %fingerprint, "Status unknown; skipping relay this cycle.");
            return RelayOutcome::skipped();
        }
        Err(error) => {
            tracing::warn!(error = %error, relay = %fingerprint, "Status fetch failed; skipping relay this cycle.");
            return RelayOutcome::skipped();
        }
    };

    let elapsed_hours = relay
        .last_sampled_at
        .map(|at| (now - at).num_seconds().max(0) as f64 / 3600.0)
        .unwrap_or(0.0);

    let mut updates: Vec<(i64, TriggerState)> = Vec::new();
    let mut pending: Vec<NotificationRequest> = Vec::new();

    for entry in &group {
        for item in &entry.conditions {
            let folded = aggregator::fold(
                DerivedMetrics {
                    uptime_hours: item.state.uptime_hours,
                    avg_bandwidth_kbps: item.state.avg_bandwidth_kbps,
                },
                snapshot.up,
                snapshot.observed_bandwidth_kbps,
                elapsed_hours,
            );
            let mut state = item.state.clone();
            state.uptime_hours = folded.uptime_hours;
            state.avg_bandwidth_kbps = folded.avg_bandwidth_kbps;

            let evaluation = trigger::evaluate(&item.condition, &state, &snapshot, now);
            if evaluation.notify {
                pending.push(notification_for(
                    &entry.watcher,
                    &relay,
                    &item.condition,
                    &evaluation.state,
                    &snapshot,
                    &config.web_base_url,
                ));
            }
            if evaluation.state != item.state {
                updates.push((item.condition_id, evaluation.state));
            }
        }
    }

    // All-or-nothing per relay: once shutdown has begun, nothing partial
    // is persisted for this relay.
    if token.is_cancelled() {
        return RelayOutcome::skipped();
    }

    if !save_with_retries(repository.as_ref(), &updates, config.write_retries, &fingerprint).await
    {
        return RelayOutcome::skipped();
    }

    if let Err(error) = repository
        .record_sample(&fingerprint, snapshot.up, snapshot.exit_capable, now)
        .await
    {
        tracing::warn!(error = %error, relay = %fingerprint, "Failed to record sample time.");
    }

    let mut enqueued = 0u64;

    // One-time operator greeting for a relay first observed stable. The
    // flag is latched before the send is attempted, so a failed or dropped
    // email is never retried into a duplicate greeting.
    if !relay.welcomed && snapshot.stable {
        if let Some(contact) = snapshot.contact.clone() {
            match repository.mark_welcomed(&fingerprint).await {
                Ok(()) => {
                    let request = NotificationRequest {
                        recipient: contact,
                        kind: NotificationKind::Greeting,
                        context: serde_json::json!({
                            "relay_name": relay.display_name(),
                            "fingerprint": relay.spaced_fingerprint(),
                            "exit_capable": snapshot.exit_capable,
                        }),
                    };
                    if notifications_tx.send(request).await.is_ok() {
                        enqueued += 1;
                    } else {
                        tracing::warn!(relay = %fingerprint, "Notification queue closed; greeting dropped.");
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, relay = %fingerprint, "Failed to latch greeting flag; deferring greeting.");
                }
            }
        }
    }

    for request in pending {
        if notifications_tx.send(request).await.is_err() {
            tracing::warn!(relay = %fingerprint, "Notification queue closed; dropping remaining notifications.");
            break;
        }
        enqueued += 1;
    }

    RelayOutcome { sampled: true, notifications: enqueued }
}

/// Builds the notification request for a fired condition.
fn notification_for(
    watcher: &Watcher,
    relay: &Relay,
    condition: &Condition,
    state: &TriggerState,
    snapshot: &RelaySnapshot,
    web_base_url: &str,
) -> NotificationRequest {
    let mut context = NotificationRequest::watcher_context(watcher, relay, web_base_url);
    let kind = match condition {
        Condition::NodeDown { grace_period_hours } => {
            context["grace_period_hours"] = serde_json::json!(grace_period_hours);
            NotificationKind::NodeDown
        }
        Condition::Version { .. } => {
            let release_status = match snapshot.version {
                VersionStatus::Obsolete => "obsolete",
                _ => "unrecommended",
            };
            context["release_status"] = serde_json::json!(release_status);
            NotificationKind::OutdatedVersion
        }
        Condition::LowBandwidth { threshold_kbps } => {
            context["threshold_kbps"] = serde_json::json!(threshold_kbps);
            context["avg_bandwidth_kbps"] = serde_json::json!(state.avg_bandwidth_kbps.round());
            NotificationKind::LowBandwidth
        }
        Condition::Milestone => {
            context["uptime_days"] = serde_json::json!((state.uptime_hours / 24.0).floor() as u64);
            context["avg_bandwidth_kbps"] = serde_json::json!(state.avg_bandwidth_kbps.round());
            context["exit_capable"] = serde_json::json!(snapshot.exit_capable);
            NotificationKind::Milestone
        }
    };

    NotificationRequest { recipient: watcher.email.clone(), kind, context }
}

/// Persists a relay's trigger-state batch, retrying a bounded number of
/// times. Returns false when the batch was discarded.
async fn save_with_retries<R: WatchRepository + ?Sized>(
    repository: &R,
    updates: &[(i64, TriggerState)],
    retries: u32,
    fingerprint: &str,
) -> bool {
    if updates.is_empty() {
        return true;
    }

    let attempts = retries.max(1);
    for attempt in 1..=attempts {
        match repository.save_trigger_states(updates).await {
            Ok(()) => return true,
            Err(error) if attempt < attempts => {
                tracing::warn!(
                    error = %error,
                    attempt,
                    relay = %fingerprint,
                    "Trigger state write failed; retrying."
                );
            }
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    relay = %fingerprint,
                    "Trigger state write failed after retries; discarding this relay's results for the cycle."
                );
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::{
        models::{RelayListing, VersionStrictness},
        persistence::traits::MockWatchRepository,
        providers::traits::MockStatusSource,
        test_helpers::{
            test_app_config, ConditionEntryBuilder, RelayBuilder, SnapshotBuilder, WatcherBuilder,
        },
    };

    const FINGERPRINT: &str = "AAAABBBBCCCCDDDDEEEEFFFF0000111122223333";

    struct TestHarness {
        config: AppConfig,
        source: MockStatusSource,
        repository: MockWatchRepository,
    }

    impl TestHarness {
        fn new() -> Self {
            Self {
                config: test_app_config(),
                source: MockStatusSource::new(),
                repository: MockWatchRepository::new(),
            }
        }

        fn build(
            self,
            tx: mpsc::Sender<NotificationRequest>,
            token: CancellationToken,
        ) -> StatusPoller<MockStatusSource, MockWatchRepository> {
            StatusPoller::new(
                Arc::new(self.config),
                Arc::new(self.source),
                Arc::new(self.repository),
                tx,
                PollMetrics::default(),
                token,
            )
        }
    }

    fn one_watch_entry(condition: Condition, state: TriggerState) -> WatchEntry {
        WatchEntry {
            watcher: WatcherBuilder::new(FINGERPRINT).build(),
            conditions: vec![ConditionEntryBuilder::new(condition).state(state).build()],
        }
    }

    #[tokio::test]
    async fn cycle_with_empty_fleet_does_nothing() {
        let mut harness = TestHarness::new();
        harness.source.expect_list_relays().returning(|| Ok(vec![]));
        harness.repository.expect_mark_all_relays_down().returning(|| Ok(()));
        harness.repository.expect_purge_stale_relays().returning(|_| Ok(0));
        harness.repository.expect_list_watch_entries().returning(|| Ok(vec![]));

        let (tx, _rx) = mpsc::channel(8);
        let poller = harness.build(tx, CancellationToken::new());

        let summary = poller.run_cycle().await.unwrap();
        assert_eq!(summary, CycleSummary::default());
    }

    #[tokio::test]
    async fn unknown_snapshot_skips_relay_without_writes() {
        let mut harness = TestHarness::new();
        harness.source.expect_list_relays().returning(|| {
            Ok(vec![RelayListing { fingerprint: FINGERPRINT.to_string(), nickname: None }])
        });
        harness.repository.expect_mark_all_relays_down().returning(|| Ok(()));
        harness.repository.expect_upsert_listed_relay().returning(|_, _| Ok(()));
        harness.repository.expect_purge_stale_relays().returning(|_| Ok(0));

        let state = TriggerState::new(Utc::now());
        harness.repository.expect_list_watch_entries().returning(move || {
            Ok(vec![one_watch_entry(
                Condition::NodeDown { grace_period_hours: 1 },
                state.clone(),
            )])
        });
        harness
            .repository
            .expect_get_relay()
            .with(eq(FINGERPRINT))
            .returning(|_| Ok(Some(RelayBuilder::new(FINGERPRINT).build())));
        harness.source.expect_snapshot().returning(|_| Ok(None));

        // No trigger-state writes and no sample recording may happen.
        harness.repository.expect_save_trigger_states().times(0);
        harness.repository.expect_record_sample().times(0);

        let (tx, mut rx) = mpsc::channel(8);
        let poller = harness.build(tx, CancellationToken::new());

        let summary = poller.run_cycle().await.unwrap();
        assert_eq!(summary.relays_sampled, 0);
        assert_eq!(summary.relays_skipped, 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn down_relay_past_grace_enqueues_one_notification() {
        let mut harness = TestHarness::new();
        harness.source.expect_list_relays().returning(|| {
            Ok(vec![RelayListing { fingerprint: FINGERPRINT.to_string(), nickname: None }])
        });
        harness.repository.expect_mark_all_relays_down().returning(|| Ok(()));
        harness.repository.expect_upsert_listed_relay().returning(|_, _| Ok(()));
        harness.repository.expect_purge_stale_relays().returning(|_| Ok(0));

        // Already triggered three hours ago with a one-hour grace period.
        let mut state = TriggerState::new(Utc::now() - chrono::Duration::hours(3));
        state.triggered = true;
        harness.repository.expect_list_watch_entries().returning(move || {
            Ok(vec![one_watch_entry(
                Condition::NodeDown { grace_period_hours: 1 },
                state.clone(),
            )])
        });
        harness
            .repository
            .expect_get_relay()
            .returning(|_| Ok(Some(RelayBuilder::new(FINGERPRINT).welcomed(true).build())));
        harness
            .source
            .expect_snapshot()
            .returning(|_| Ok(Some(SnapshotBuilder::new().up(false).build())));

        harness
            .repository
            .expect_save_trigger_states()
            .withf(|updates| updates.len() == 1 && updates[0].1.notified)
            .times(1)
            .returning(|_| Ok(()));
        harness.repository.expect_record_sample().times(1).returning(|_, _, _, _| Ok(()));

        let (tx, mut rx) = mpsc::channel(8);
        let poller = harness.build(tx, CancellationToken::new());

        let summary = poller.run_cycle().await.unwrap();
        assert_eq!(summary.relays_sampled, 1);
        assert_eq!(summary.notifications_enqueued, 1);

        let request = rx.try_recv().unwrap();
        assert_eq!(request.kind, NotificationKind::NodeDown);
        assert_eq!(request.context["grace_period_hours"], 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_writes_discard_notifications() {
        let mut harness = TestHarness::new();
        harness.source.expect_list_relays().returning(|| {
            Ok(vec![RelayListing { fingerprint: FINGERPRINT.to_string(), nickname: None }])
        });
        harness.repository.expect_mark_all_relays_down().returning(|| Ok(()));
        harness.repository.expect_upsert_listed_relay().returning(|_, _| Ok(()));
        harness.repository.expect_purge_stale_relays().returning(|_| Ok(0));

        let mut state = TriggerState::new(Utc::now() - chrono::Duration::hours(3));
        state.triggered = true;
        harness.repository.expect_list_watch_entries().returning(move || {
            Ok(vec![one_watch_entry(
                Condition::NodeDown { grace_period_hours: 1 },
                state.clone(),
            )])
        });
        harness
            .repository
            .expect_get_relay()
            .returning(|_| Ok(Some(RelayBuilder::new(FINGERPRINT).welcomed(true).build())));
        harness
            .source
            .expect_snapshot()
            .returning(|_| Ok(Some(SnapshotBuilder::new().up(false).build())));

        // Every write attempt fails; the configured retry count is 3.
        harness
            .repository
            .expect_save_trigger_states()
            .times(3)
            .returning(|_| Err(PersistenceError::OperationFailed("disk full".to_string())));
        harness.repository.expect_record_sample().times(0);

        let (tx, mut rx) = mpsc::channel(8);
        let poller = harness.build(tx, CancellationToken::new());

        let summary = poller.run_cycle().await.unwrap();
        assert_eq!(summary.relays_skipped, 1);
        assert_eq!(summary.notifications_enqueued, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn version_condition_fires_on_obsolete_release() {
        let mut harness = TestHarness::new();
        harness.source.expect_list_relays().returning(|| {
            Ok(vec![RelayListing { fingerprint: FINGERPRINT.to_string(), nickname: None }])
        });
        harness.repository.expect_mark_all_relays_down().returning(|| Ok(()));
        harness.repository.expect_upsert_listed_relay().returning(|_, _| Ok(()));
        harness.repository.expect_purge_stale_relays().returning(|_| Ok(0));

        let state = TriggerState::new(Utc::now());
        harness.repository.expect_list_watch_entries().returning(move || {
            Ok(vec![one_watch_entry(
                Condition::Version { strictness: VersionStrictness::Obsolete },
                state.clone(),
            )])
        });
        harness
            .repository
            .expect_get_relay()
            .returning(|_| Ok(Some(RelayBuilder::new(FINGERPRINT).welcomed(true).build())));
        harness.source.expect_snapshot().returning(|_| {
            Ok(Some(SnapshotBuilder::new().version(VersionStatus::Obsolete).build()))
        });

        harness.repository.expect_save_trigger_states().times(1).returning(|_| Ok(()));
        harness.repository.expect_record_sample().times(1).returning(|_, _, _, _| Ok(()));

        let (tx, mut rx) = mpsc::channel(8);
        let poller = harness.build(tx, CancellationToken::new());

        poller.run_cycle().await.unwrap();
        let request = rx.try_recv().unwrap();
        assert_eq!(request.kind, NotificationKind::OutdatedVersion);
        assert_eq!(request.context["release_status"], "obsolete");
    }

    #[tokio::test]
    async fn stable_relay_with_contact_gets_one_greeting() {
        let mut harness = TestHarness::new();
        harness.source.expect_list_relays().returning(|| {
            Ok(vec![RelayListing { fingerprint: FINGERPRINT.to_string(), nickname: None }])
        });
        harness.repository.expect_mark_all_relays_down().returning(|| Ok(()));
        harness.repository.expect_upsert_listed_relay().returning(|_, _| Ok(()));
        harness.repository.expect_purge_stale_relays().returning(|_| Ok(0));

        let state = TriggerState::new(Utc::now());
        harness.repository.expect_list_watch_entries().returning(move || {
            Ok(vec![one_watch_entry(Condition::Milestone, state.clone())])
        });
        harness
            .repository
            .expect_get_relay()
            .returning(|_| Ok(Some(RelayBuilder::new(FINGERPRINT).build())));
        harness.source.expect_snapshot().returning(|_| {
            Ok(Some(
                SnapshotBuilder::new().stable(true).contact("operator@example.net").build(),
            ))
        });

        // The milestone metrics seed from the first sample, so one state
        // write still happens.
        harness.repository.expect_save_trigger_states().times(1).returning(|_| Ok(()));
        harness.repository.expect_record_sample().times(1).returning(|_, _, _, _| Ok(()));
        harness
            .repository
            .expect_mark_welcomed()
            .with(eq(FINGERPRINT))
            .times(1)
            .returning(|_| Ok(()));

        let (tx, mut rx) = mpsc::channel(8);
        let poller = harness.build(tx, CancellationToken::new());

        let summary = poller.run_cycle().await.unwrap();
        assert_eq!(summary.notifications_enqueued, 1);

        let request = rx.try_recv().unwrap();
        assert_eq!(request.kind, NotificationKind::Greeting);
        assert_eq!(request.recipient, "operator@example.net");
    }
}
