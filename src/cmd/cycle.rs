//! The `cycle` command: runs exactly one poll cycle and exits.
//!
//! By default notifications are printed to stdout instead of being mailed,
//! so operators can inspect what a cycle would send before pointing the
//! daemon at a real SMTP relay.

use std::sync::Arc;

use clap::Args;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    context::PollMetrics,
    engine::poller::StatusPoller,
    models::NotificationRequest,
    notifier::{
        dispatcher::NotificationDispatcher, email::EmailNotifier, stdout::StdoutNotifier, Notifier,
    },
    persistence::{sqlite::SqliteWatchRepository, traits::WatchRepository},
    providers::directory::HttpDirectorySource,
};

/// Arguments for the `cycle` subcommand.
#[derive(Args, Debug)]
pub struct CycleArgs {
    /// Deliver real email instead of printing notifications to stdout.
    #[arg(long)]
    pub send_mail: bool,
}

/// Executes one poll cycle and prints a summary.
pub async fn execute(
    config_dir: Option<&str>,
    args: CycleArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new(config_dir)?;

    let repository = Arc::new(SqliteWatchRepository::new(&config.database_url).await?);
    repository.run_migrations().await?;

    let source = Arc::new(HttpDirectorySource::new(
        config.directory_url.clone(),
        &config.directory_client,
        &config.directory_retry,
    )?);

    let notifier: Arc<dyn Notifier> = if args.send_mail {
        Arc::new(EmailNotifier::new(&config.smtp)?)
    } else {
        Arc::new(StdoutNotifier)
    };

    let cancellation_token = CancellationToken::new();
    let (notifications_tx, notifications_rx) =
        mpsc::channel::<NotificationRequest>(config.notification_channel_capacity as usize);

    let dispatcher = NotificationDispatcher::new(
        notifier,
        notifications_rx,
        config.notifier_workers,
        cancellation_token.clone(),
    )?;
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    let poller = StatusPoller::new(
        Arc::new(config),
        source,
        Arc::clone(&repository),
        notifications_tx,
        PollMetrics::default(),
        cancellation_token,
    );

    let summary = poller.run_cycle().await?;

    // Dropping the poller closes the queue; the dispatcher drains and
    // exits on its own.
    drop(poller);
    dispatcher_handle.await?;

    repository.flush().await?;
    repository.close().await;

    println!(
        "cycle complete: {} sampled, {} skipped, {} notifications, {} relays purged",
        summary.relays_sampled,
        summary.relays_skipped,
        summary.notifications_enqueued,
        summary.relays_purged
    );
    Ok(())
}
