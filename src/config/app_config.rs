use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{
    deserialize_duration_from_seconds, serialize_duration_to_seconds, DirectoryClientConfig,
    DirectoryRetryConfig, SmtpConfig,
};

/// Provides the default value for poll_jitter_secs.
fn default_poll_jitter() -> Duration {
    Duration::from_secs(60)
}

/// Provides the default value for concurrency.
fn default_concurrency() -> u64 {
    12
}

/// Provides the default value for write_retries.
fn default_write_retries() -> u32 {
    3
}

/// Provides the default value for relay_retention_days.
fn default_relay_retention_days() -> u32 {
    365
}

/// Provides the default value for shutdown_timeout_secs.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Provides the default value for notification_channel_capacity.
fn default_notification_channel_capacity() -> u32 {
    1024
}

/// Provides the default value for notifier_workers.
fn default_notifier_workers() -> usize {
    4
}

/// Application configuration for relaywatch.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Database URL for the SQLite database.
    pub database_url: String,

    /// Base URL of the relay-status directory API.
    pub directory_url: Url,

    /// The interval between poll cycles.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub poll_interval_secs: Duration,

    /// Upper bound on the random delay added before each cycle starts, to
    /// spread probe load across the fleet.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_poll_jitter"
    )]
    pub poll_jitter_secs: Duration,

    /// The number of relays sampled concurrently within one cycle.
    #[serde(default = "default_concurrency")]
    pub concurrency: u64,

    /// How many times a failed trigger-state write is retried before the
    /// relay's results are discarded for the cycle.
    #[serde(default = "default_write_retries")]
    pub write_retries: u32,

    /// Days a relay may go unseen before it is purged along with orphaned
    /// trigger state.
    #[serde(default = "default_relay_retention_days")]
    pub relay_retention_days: u32,

    /// The maximum time to wait for graceful shutdown.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_shutdown_timeout"
    )]
    pub shutdown_timeout_secs: Duration,

    /// The capacity of the bounded notification queue.
    #[serde(default = "default_notification_channel_capacity")]
    pub notification_channel_capacity: u32,

    /// How many worker tasks drain the notification queue.
    #[serde(default = "default_notifier_workers")]
    pub notifier_workers: usize,

    /// Base URL for unsubscribe/preference links in outgoing mail.
    pub web_base_url: String,

    /// Connection settings for the directory HTTP client.
    #[serde(default)]
    pub directory_client: DirectoryClientConfig,

    /// Retry policy for directory requests.
    #[serde(default)]
    pub directory_retry: DirectoryRetryConfig,

    /// Outbound SMTP settings.
    #[serde(default)]
    pub smtp: SmtpConfig,
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading from the configuration directory.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("RELAYWATCH").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    #[cfg(test)]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            directory_url: Url::parse("http://localhost:9030").expect("static URL"),
            poll_interval_secs: Duration::from_secs(3600),
            poll_jitter_secs: default_poll_jitter(),
            concurrency: default_concurrency(),
            write_retries: default_write_retries(),
            relay_retention_days: default_relay_retention_days(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            notification_channel_capacity: default_notification_channel_capacity(),
            notifier_workers: default_notifier_workers(),
            web_base_url: "http://localhost:8000".to_string(),
            directory_client: DirectoryClientConfig::default(),
            directory_retry: DirectoryRetryConfig::default(),
            smtp: SmtpConfig::default(),
        }
    }
}

/// A builder for creating `AppConfig` instances for testing.
#[cfg(test)]
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn database_url(mut self, url: &str) -> Self {
        self.config.database_url = url.to_string();
        self
    }

    pub fn directory_url(mut self, url: Url) -> Self {
        self.config.directory_url = url;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_secs = interval;
        self
    }

    pub fn poll_jitter(mut self, jitter: Duration) -> Self {
        self.config.poll_jitter_secs = jitter;
        self
    }

    pub fn concurrency(mut self, concurrency: u64) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn write_retries(mut self, retries: u32) -> Self {
        self.config.write_retries = retries;
        self
    }

    pub fn relay_retention_days(mut self, days: u32) -> Self {
        self.config.relay_retention_days = days;
        self
    }

    pub fn web_base_url(mut self, url: &str) -> Self {
        self.config.web_base_url = url.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_builder() {
        let config = AppConfig::builder()
            .database_url("sqlite::memory:")
            .directory_url(Url::parse("http://localhost:9030").unwrap())
            .poll_interval(Duration::from_secs(600))
            .concurrency(4)
            .web_base_url("https://watch.example.net")
            .build();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.poll_interval_secs, Duration::from_secs(600));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.web_base_url, "https://watch.example.net");
    }

    #[test]
    fn test_app_config_from_file() {
        let config_content = r#"
        database_url: "sqlite::memory:"
        directory_url: "https://status.example.net/api"
        poll_interval_secs: 3600
        web_base_url: "https://watch.example.net"
        smtp:
          host: "mail.example.net"
          from_address: "ops@example.net"
        "#;
        let temp_dir = tempfile::tempdir().unwrap();
        let app_yaml_path = temp_dir.path().join("app.yaml");
        std::fs::write(&app_yaml_path, config_content).unwrap();

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.poll_interval_secs, Duration::from_secs(3600));
        assert_eq!(config.poll_jitter_secs, Duration::from_secs(60));
        assert_eq!(config.concurrency, 12);
        assert_eq!(config.write_retries, 3);
        assert_eq!(config.relay_retention_days, 365);
        assert_eq!(config.shutdown_timeout_secs, Duration::from_secs(30));
        assert_eq!(config.notification_channel_capacity, 1024);
        assert_eq!(config.smtp.host, "mail.example.net");
        assert_eq!(config.smtp.port, 587);
    }

    #[test]
    fn test_app_config_from_file_with_client_overrides() {
        let config_content = r#"
        database_url: "sqlite::memory:"
        directory_url: "https://status.example.net/api"
        poll_interval_secs: 600
        web_base_url: "https://watch.example.net"
        directory_client:
          max_idle_per_host: 50
          connect_timeout: 20
        directory_retry:
          max_retries: 5
        "#;
        let temp_dir = tempfile::tempdir().unwrap();
        let app_yaml_path = temp_dir.path().join("app.yaml");
        std::fs::write(&app_yaml_path, config_content).unwrap();

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();

        assert_eq!(config.directory_client.max_idle_per_host, 50);
        assert_eq!(config.directory_client.connect_timeout, Duration::from_secs(20));
        assert_eq!(config.directory_client.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.directory_retry.max_retries, 5);
    }
}
