//! SMTP delivery via the `lettre` async transport.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    config::SmtpConfig,
    notifier::{Notifier, NotifierError},
};

/// Sends notification emails over SMTP (STARTTLS).
///
/// The transport is constructed once and owned for the process lifetime;
/// delivery is best effort with no read-back of the relay's queue.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    /// Creates an email notifier from the SMTP settings.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifierError> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?.port(config.port);

        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        let from: Mailbox = config.from_address.parse()?;
        Ok(Self { mailer: builder.build(), from })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifierError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(recipient.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifierError::Build(e.to_string()))?;

        self.mailer.send(email).await?;
        tracing::info!(recipient, subject, "Notification email sent.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmtpConfig;

    #[test]
    fn rejects_unparseable_from_address() {
        let config = SmtpConfig {
            from_address: "not an address".to_string(),
            ..SmtpConfig::default()
        };
        assert!(matches!(EmailNotifier::new(&config), Err(NotifierError::Address(_))));
    }

    #[tokio::test]
    async fn rejects_unparseable_recipient() {
        let notifier = EmailNotifier::new(&SmtpConfig::default()).unwrap();
        let result = notifier.send("not an address", "subject", "body").await;
        assert!(matches!(result, Err(NotifierError::Address(_))));
    }
}
