//! A notifier that writes messages to standard output instead of sending
//! them. Used by the single-cycle command so operators can inspect what
//! would have been mailed.

use async_trait::async_trait;

use crate::notifier::{Notifier, NotifierError};

/// Prints each notification to stdout.
#[derive(Debug, Default)]
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifierError> {
        println!("--- notification ---");
        println!("To: {recipient}");
        println!("Subject: {subject}");
        println!();
        println!("{body}");
        Ok(())
    }
}
