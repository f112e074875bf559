//! Lifecycle management for the relaywatch daemon.
//!
//! The supervisor owns the major components (status source, repository,
//! poller, notification dispatcher), wires them together, listens for
//! shutdown signals, and orchestrates a clean exit: the poller stops
//! starting new work, in-flight relay evaluations finish or are abandoned
//! within a timeout, and the notification queue drains deterministically.

mod builder;

use std::sync::Arc;

use builder::SupervisorBuilder;
use thiserror::Error;
use tokio::{signal, sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    context::PollMetrics,
    engine::poller::StatusPoller,
    models::NotificationRequest,
    notifier::{dispatcher::NotificationDispatcher, template::TemplateError, Notifier},
    persistence::{error::PersistenceError, traits::WatchRepository},
    providers::traits::StatusSource,
};

/// Errors raised while assembling or running the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The builder was finished without an application configuration.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// The builder was finished without a repository.
    #[error("Missing repository for Supervisor")]
    MissingRepository,

    /// The builder was finished without a status source.
    #[error("Missing status source for Supervisor")]
    MissingStatusSource,

    /// The builder was finished without a notification transport.
    #[error("Missing notifier for Supervisor")]
    MissingNotifier,

    /// The startup read of watch entries failed.
    #[error("Failed to load watch entries from repository: {0}")]
    WatchEntryLoadError(#[from] PersistenceError),

    /// The notification templates failed to build.
    #[error("Notification template error: {0}")]
    Template(#[from] TemplateError),
}

/// The primary runtime manager for the daemon.
///
/// `run` is the main process loop: it spawns the poller and the
/// notification dispatcher, watches their health, and coordinates the
/// shutdown sequence when a signal arrives or a task dies.
pub struct Supervisor<R: WatchRepository + 'static> {
    /// Shared application configuration.
    config: Arc<AppConfig>,

    /// Relays, watchers, and trigger state.
    repository: Arc<R>,

    /// Live relay status.
    source: Arc<dyn StatusSource>,

    /// Delivers rendered notifications.
    notifier: Arc<dyn Notifier>,

    /// Shared poll statistics.
    metrics: PollMetrics,

    /// Signals every supervised task to stop.
    cancellation_token: CancellationToken,

    /// The tasks being supervised.
    join_set: JoinSet<()>,
}

impl<R: WatchRepository + 'static> Supervisor<R> {
    /// Creates a supervisor over fully-constructed components. Callers
    /// normally go through [`Supervisor::builder`] instead.
    pub fn new(
        config: AppConfig,
        repository: Arc<R>,
        source: Arc<dyn StatusSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            repository,
            source,
            notifier,
            metrics: PollMetrics::default(),
            cancellation_token: CancellationToken::new(),
            join_set: JoinSet::new(),
        }
    }

    /// Entry point for assembling a supervisor piece by piece.
    pub fn builder() -> SupervisorBuilder<R> {
        SupervisorBuilder::<R>::new()
    }

    /// Shared poll statistics, readable while the supervisor runs.
    pub fn metrics(&self) -> PollMetrics {
        self.metrics.clone()
    }

    /// Runs the daemon until a shutdown signal arrives or a supervised
    /// task fails, then shuts everything down in order: cancel, drain the
    /// task set within the configured timeout, flush the repository.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        self.spawn_signal_listener();

        // The bounded queue connecting the poller to the dispatcher.
        let (notifications_tx, notifications_rx) = mpsc::channel::<NotificationRequest>(
            self.config.notification_channel_capacity as usize,
        );

        let dispatcher = NotificationDispatcher::new(
            Arc::clone(&self.notifier),
            notifications_rx,
            self.config.notifier_workers,
            self.cancellation_token.clone(),
        )?;
        self.join_set.spawn(dispatcher.run());

        // The poller holds the only sender, so the dispatcher's queue
        // closes as soon as the poller stops.
        let poller = StatusPoller::new(
            Arc::clone(&self.config),
            Arc::clone(&self.source),
            Arc::clone(&self.repository),
            notifications_tx,
            self.metrics.clone(),
            self.cancellation_token.clone(),
        );
        self.join_set.spawn(poller.run());

        // Watch task health until shutdown is requested or every task has
        // finished on its own.
        loop {
            tokio::select! {
                joined = self.join_set.join_next() => {
                    match joined {
                        Some(Ok(())) => {}
                        Some(Err(error)) => {
                            tracing::error!(error = %error, "A supervised task died; shutting down.");
                            self.cancellation_token.cancel();
                        }
                        None => break,
                    }
                }
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        let shutdown_timeout = self.config.shutdown_timeout_secs;

        // Let in-flight work finish cleanly before aborting what is left.
        let drain = async {
            while self.join_set.join_next().await.is_some() {}
        };
        if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
            tracing::warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                "Supervised tasks did not stop in time; aborting the stragglers."
            );
            self.join_set.shutdown().await;
        }
        tracing::info!("All supervised tasks have stopped.");

        let flush = async {
            if let Err(error) = self.repository.flush().await {
                tracing::error!(error = %error, "Final repository flush failed.");
            }
            if let Err(error) = self.repository.cleanup().await {
                tracing::error!(error = %error, "Repository cleanup failed.");
            }
            let stats = self.metrics.snapshot().await;
            tracing::info!(
                cycles = stats.cycles_completed,
                last_cycle_ms = stats.last_cycle_duration.as_millis() as u64,
                "Final poll statistics."
            );
        };
        if tokio::time::timeout(shutdown_timeout, flush).await.is_err() {
            tracing::warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                "Repository flush did not finish in time; continuing shutdown."
            );
        }

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }

    /// Spawns the task that turns SIGINT/SIGTERM into a cancellation.
    fn spawn_signal_listener(&mut self) {
        let token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            let interrupt = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(error) => {
                        tracing::error!(error = %error, "Could not register the SIGTERM handler.");
                        std::future::pending::<()>().await;
                    }
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = interrupt => tracing::info!("SIGINT received; beginning graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received; beginning graceful shutdown."),
            }
            token.cancel();
        });
    }
}
