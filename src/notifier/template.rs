//! Rendering of notification messages from per-kind templates.

use minijinja::Environment;
use thiserror::Error;

use crate::models::NotificationKind;

/// Prefix applied to every outgoing subject line.
pub const SUBJECT_PREFIX: &str = "[relaywatch] ";

const NODE_DOWN_TEMPLATE: &str = "\
This is a relaywatch report.

The relay {{ relay_name }} (id: {{ fingerprint }}) that you chose to monitor
has been unreachable for at least {{ grace_period_hours }} hour(s). You may
wish to look at it to see why.

You can unsubscribe from these reports at any time by visiting:

{{ unsubscribe_url }}

or change your notification preferences here:

{{ preferences_url }}
";

const OUTDATED_VERSION_TEMPLATE: &str = "\
This is a relaywatch report.

The relay {{ relay_name }} (id: {{ fingerprint }}) that you chose to monitor
is running an {{ release_status }} software release. Please consider
upgrading to the latest stable release.

You can unsubscribe from these reports at any time by visiting:

{{ unsubscribe_url }}

or change your notification preferences here:

{{ preferences_url }}
";

const LOW_BANDWIDTH_TEMPLATE: &str = "\
This is a relaywatch report.

The relay {{ relay_name }} (id: {{ fingerprint }}) that you chose to monitor
has an observed average bandwidth of {{ avg_bandwidth_kbps }} KB/s, below
your configured threshold of {{ threshold_kbps }} KB/s. You may wish to look
at it to see why.

You can unsubscribe from these reports at any time by visiting:

{{ unsubscribe_url }}

or change your notification preferences here:

{{ preferences_url }}
";

const MILESTONE_TEMPLATE: &str = "\
This is a relaywatch report.

Congratulations! The relay you have been observing, {{ relay_name }}
(id: {{ fingerprint }}), has been up for {{ uptime_days }} days with an
average bandwidth of {{ avg_bandwidth_kbps }} KB/s, which makes its operator
eligible for the sustained-uptime reward. Thank you for your contribution to
the network!

You can unsubscribe from these reports at any time by visiting:

{{ unsubscribe_url }}

or change your notification preferences here:

{{ preferences_url }}
";

const GREETING_TEMPLATE: &str = "\
Hello and welcome!

We noticed that your relay {{ relay_name }} (id: {{ fingerprint }}) has been
running long enough to be flagged as stable. Thank you for your contribution
to the network!

As an operator you may be interested in the relaywatch service, which sends
email notifications when a relay is down, runs an out-of-date release, or
drops below a bandwidth threshold.
{% if exit_capable %}
Since your relay permits exit traffic, you may also want to review the legal
guidance for exit operators published by your network community.
{% endif %}
We will not send you any further email unless you subscribe.

Disclaimer: if you have no idea why you received this message, we sincerely
apologize; you will not hear from us again.
";

/// A rendered, ready-to-send message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Full subject line, including the service prefix.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Error type for message rendering.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template failed to parse or render.
    #[error("Failed to render template: {0}")]
    Render(#[from] minijinja::Error),
}

/// Renders notification messages with the minijinja templating engine.
///
/// The environment is strict about undefined variables so a context bug
/// fails loudly in tests instead of mailing out a half-empty report.
pub struct MessageRenderer {
    env: Environment<'static>,
}

impl MessageRenderer {
    /// Creates a renderer with all notification templates registered.
    pub fn new() -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        env.add_template(NotificationKind::NodeDown.as_str(), NODE_DOWN_TEMPLATE)?;
        env.add_template(NotificationKind::OutdatedVersion.as_str(), OUTDATED_VERSION_TEMPLATE)?;
        env.add_template(NotificationKind::LowBandwidth.as_str(), LOW_BANDWIDTH_TEMPLATE)?;
        env.add_template(NotificationKind::Milestone.as_str(), MILESTONE_TEMPLATE)?;
        env.add_template(NotificationKind::Greeting.as_str(), GREETING_TEMPLATE)?;
        Ok(Self { env })
    }

    /// Renders the message for a notification kind with the given context.
    pub fn render(
        &self,
        kind: NotificationKind,
        context: &serde_json::Value,
    ) -> Result<RenderedMessage, TemplateError> {
        let template = self.env.get_template(kind.as_str())?;
        let body = template.render(context)?;
        Ok(RenderedMessage { subject: subject_for(kind), body })
    }
}

fn subject_for(kind: NotificationKind) -> String {
    let subject = match kind {
        NotificationKind::Greeting => "Thanks for running a relay!",
        NotificationKind::NodeDown => "Relay down",
        NotificationKind::OutdatedVersion => "Relay running an out-of-date release",
        NotificationKind::LowBandwidth => "Relay below bandwidth threshold",
        NotificationKind::Milestone => "Congratulations on 61 days of uptime!",
    };
    format!("{SUBJECT_PREFIX}{subject}")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn renderer() -> MessageRenderer {
        MessageRenderer::new().expect("templates must parse")
    }

    fn base_context() -> serde_json::Value {
        json!({
            "relay_name": "ham",
            "fingerprint": "AAAA BBBB CCCC DDDD",
            "unsubscribe_url": "https://watch.example.net/unsubscribe/tok1",
            "preferences_url": "https://watch.example.net/preferences/tok2",
        })
    }

    #[test]
    fn node_down_includes_grace_and_links() {
        let mut context = base_context();
        context["grace_period_hours"] = json!(12);

        let message = renderer().render(NotificationKind::NodeDown, &context).unwrap();
        assert_eq!(message.subject, "[relaywatch] Relay down");
        assert!(message.body.contains("at least 12 hour(s)"));
        assert!(message.body.contains("https://watch.example.net/unsubscribe/tok1"));
        assert!(message.body.contains("https://watch.example.net/preferences/tok2"));
    }

    #[test]
    fn missing_context_variable_is_an_error() {
        // grace_period_hours is absent.
        let result = renderer().render(NotificationKind::NodeDown, &base_context());
        assert!(matches!(result, Err(TemplateError::Render(_))));
    }

    #[test]
    fn greeting_appends_exit_guidance_only_for_exit_relays() {
        let context = json!({
            "relay_name": "ham",
            "fingerprint": "AAAA BBBB",
            "exit_capable": true,
        });
        let message = renderer().render(NotificationKind::Greeting, &context).unwrap();
        assert!(message.body.contains("legal guidance"));

        let context = json!({
            "relay_name": "ham",
            "fingerprint": "AAAA BBBB",
            "exit_capable": false,
        });
        let message = renderer().render(NotificationKind::Greeting, &context).unwrap();
        assert!(!message.body.contains("legal guidance"));
    }

    #[test]
    fn low_bandwidth_reports_both_numbers() {
        let mut context = base_context();
        context["avg_bandwidth_kbps"] = json!(12.0);
        context["threshold_kbps"] = json!(20);

        let message = renderer().render(NotificationKind::LowBandwidth, &context).unwrap();
        assert!(message.body.contains("12.0 KB/s"));
        assert!(message.body.contains("20 KB/s"));
    }
}
