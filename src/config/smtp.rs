//! SMTP settings for the email notifier.

use serde::{Deserialize, Serialize};

fn default_smtp_port() -> u16 {
    587
}

/// Settings for the outbound SMTP relay. The transport uses STARTTLS;
/// credentials are optional for relays that authenticate by network
/// position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub host: String,

    /// SMTP server port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// RFC 5322 "From" address on outgoing mail.
    pub from_address: String,

    /// Optional SMTP username.
    #[serde(default)]
    pub user: Option<String>,

    /// Optional SMTP password.
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_smtp_port(),
            from_address: "relaywatch-ops@localhost".to_string(),
            user: None,
            password: None,
        }
    }
}
