//! The notification dispatch queue.
//!
//! The poll cycle pushes [`NotificationRequest`]s into a bounded channel;
//! a fixed set of worker permits drains it concurrently. On shutdown the
//! queue is drained deterministically: everything already enqueued is
//! rendered and handed to the transport, then in-flight sends are awaited.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

use crate::{
    models::NotificationRequest,
    notifier::{
        template::{MessageRenderer, TemplateError},
        Notifier,
    },
};

/// Consumes the notification queue and drives the transport.
pub struct NotificationDispatcher {
    /// The transport that actually delivers messages.
    notifier: Arc<dyn Notifier>,
    /// Renders per-kind templates into subject and body.
    renderer: MessageRenderer,
    /// The receiver side of the bounded notification queue.
    notifications_rx: mpsc::Receiver<NotificationRequest>,
    /// Maximum concurrent sends.
    workers: usize,
    /// A token used to signal a graceful shutdown.
    cancellation_token: CancellationToken,
}

impl NotificationDispatcher {
    /// Creates a new NotificationDispatcher instance.
    pub fn new(
        notifier: Arc<dyn Notifier>,
        notifications_rx: mpsc::Receiver<NotificationRequest>,
        workers: usize,
        cancellation_token: CancellationToken,
    ) -> Result<Self, TemplateError> {
        Ok(Self {
            notifier,
            renderer: MessageRenderer::new()?,
            notifications_rx,
            workers,
            cancellation_token,
        })
    }

    /// Runs until the queue closes or shutdown is signalled, then drains.
    pub async fn run(mut self) {
        let semaphore = Arc::new(Semaphore::new(self.workers.max(1)));
        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("NotificationDispatcher cancellation signal received; draining queue...");
                    break;
                }

                maybe_request = self.notifications_rx.recv() => {
                    match maybe_request {
                        Some(request) => {
                            self.dispatch(request, &semaphore, &mut in_flight).await;
                        }
                        None => {
                            // All senders dropped; nothing more will arrive.
                            break;
                        }
                    }
                }
            }
        }

        // Everything already enqueued still goes out; nothing new can be
        // added at this point.
        while let Ok(request) = self.notifications_rx.try_recv() {
            self.dispatch(request, &semaphore, &mut in_flight).await;
        }
        while in_flight.join_next().await.is_some() {}

        tracing::info!("NotificationDispatcher has shut down.");
    }

    /// Renders one request and spawns its send under a worker permit.
    async fn dispatch(
        &self,
        request: NotificationRequest,
        semaphore: &Arc<Semaphore>,
        in_flight: &mut JoinSet<()>,
    ) {
        let rendered = match self.renderer.render(request.kind, &request.context) {
            Ok(rendered) => rendered,
            Err(error) => {
                tracing::error!(
                    error = %error,
                    kind = request.kind.as_str(),
                    "Failed to render notification; dropping."
                );
                return;
            }
        };

        let permit = match Arc::clone(semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let notifier = Arc::clone(&self.notifier);
        in_flight.spawn(async move {
            let _permit = permit;
            if let Err(error) =
                notifier.send(&request.recipient, &rendered.subject, &rendered.body).await
            {
                // Best effort: a failed send is recorded and never retried,
                // keeping the at-most-once guarantee.
                tracing::error!(
                    error = %error,
                    recipient = %request.recipient,
                    kind = request.kind.as_str(),
                    "Notification send failed."
                );
            }
        });
    }
}
