//! Outbound notifications: the transport trait, message rendering, and the
//! bounded dispatch queue that decouples sending from the poll cycle.

pub mod dispatcher;
pub mod email;
pub mod stdout;
pub mod template;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

/// Errors from a notification transport.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The message could not be assembled.
    #[error("Message build error: {0}")]
    Build(String),
}

/// A transport that delivers one rendered notification.
///
/// Delivery is best effort with no confirmation: the engine treats a
/// successful enqueue as the notification event, so transports must never
/// block the poll cycle and failures are only logged.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends one message to the recipient.
    async fn send(&self, recipient: &str, subject: &str, body: &str)
        -> Result<(), NotifierError>;
}
