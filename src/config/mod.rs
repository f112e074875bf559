//! Configuration module for relaywatch.

mod app_config;
mod helpers;
mod retry;
mod smtp;

pub use app_config::AppConfig;
pub use helpers::{
    deserialize_duration_from_ms, deserialize_duration_from_seconds, serialize_duration_to_ms,
    serialize_duration_to_seconds,
};
pub use retry::{DirectoryClientConfig, DirectoryRetryConfig, JitterSetting};
pub use smtp::SmtpConfig;
