//! HTTP directory client: a [`StatusSource`] backed by a relay-status API.

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, Jitter, RetryTransientMiddleware};
use serde::Deserialize;
use url::Url;

use crate::{
    config::{DirectoryClientConfig, DirectoryRetryConfig, JitterSetting},
    models::{RelayListing, RelaySnapshot, VersionStatus},
    providers::traits::{StatusSource, StatusSourceError},
};

/// Builds the retryable HTTP client used for all directory requests.
fn create_retryable_http_client(
    retry: &DirectoryRetryConfig,
    base_client: reqwest::Client,
) -> ClientWithMiddleware {
    let policy_builder = match retry.jitter {
        JitterSetting::None => ExponentialBackoff::builder().jitter(Jitter::None),
        JitterSetting::Full => ExponentialBackoff::builder().jitter(Jitter::Full),
    };

    let retry_policy = policy_builder
        .base(retry.backoff_base)
        .retry_bounds(retry.initial_backoff_ms, retry.max_backoff_secs)
        .build_with_max_retries(retry.max_retries);

    ClientBuilder::new(base_client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}

// Wire format of the directory API.

#[derive(Debug, Deserialize)]
struct ListingResponse {
    relays: Vec<ListingEntry>,
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    fingerprint: String,
    #[serde(default)]
    nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    running: bool,
    #[serde(default)]
    version_status: Option<String>,
    /// Observed bandwidth in bytes per second.
    #[serde(default)]
    observed_bandwidth: u64,
    #[serde(default)]
    exit: bool,
    #[serde(default)]
    stable: bool,
    #[serde(default)]
    contact: Option<String>,
}

impl DetailResponse {
    /// Converts the wire detail into a snapshot. Returns `None` when the
    /// version classification is missing or unrecognized, so the caller
    /// treats the whole sample as unknown rather than guessing.
    fn into_snapshot(self) -> Option<RelaySnapshot> {
        let version = match self.version_status.as_deref() {
            Some("recommended") => VersionStatus::Recommended,
            Some("unrecommended") | Some("experimental") | Some("old") => {
                VersionStatus::Unrecommended
            }
            Some("obsolete") => VersionStatus::Obsolete,
            _ => return None,
        };

        Some(RelaySnapshot {
            up: self.running,
            version,
            observed_bandwidth_kbps: self.observed_bandwidth as f64 / 1024.0,
            exit_capable: self.exit,
            stable: self.stable,
            contact: self.contact,
        })
    }
}

/// A [`StatusSource`] that queries a relay-status directory over HTTP.
pub struct HttpDirectorySource {
    base_url: Url,
    client: ClientWithMiddleware,
}

impl HttpDirectorySource {
    /// Creates a directory source for the given base URL. The underlying
    /// client retries transient failures with exponential backoff.
    pub fn new(
        base_url: Url,
        client_config: &DirectoryClientConfig,
        retry_config: &DirectoryRetryConfig,
    ) -> Result<Self, StatusSourceError> {
        let base_client = reqwest::Client::builder()
            .pool_max_idle_per_host(client_config.max_idle_per_host)
            .pool_idle_timeout(client_config.idle_timeout)
            .connect_timeout(client_config.connect_timeout)
            .build()?;

        Ok(Self { base_url, client: create_retryable_http_client(retry_config, base_client) })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

#[async_trait]
impl StatusSource for HttpDirectorySource {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn list_relays(&self) -> Result<Vec<RelayListing>, StatusSourceError> {
        let response = self.client.get(self.endpoint("relays")).send().await?;
        if !response.status().is_success() {
            return Err(StatusSourceError::Status(response.status()));
        }

        let listing: ListingResponse = response.json().await?;
        tracing::debug!(count = listing.relays.len(), "Fetched directory listing.");
        Ok(listing
            .relays
            .into_iter()
            .map(|entry| RelayListing { fingerprint: entry.fingerprint, nickname: entry.nickname })
            .collect())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn snapshot(
        &self,
        fingerprint: &str,
    ) -> Result<Option<RelaySnapshot>, StatusSourceError> {
        let response =
            self.client.get(self.endpoint(&format!("relays/{fingerprint}"))).send().await?;

        // A relay the directory has no record of is an unknown sample, not
        // an error.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StatusSourceError::Status(response.status()));
        }

        let detail: DetailResponse = response.json().await?;
        Ok(detail.into_snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_converts_bandwidth_to_kbps() {
        let detail = DetailResponse {
            running: true,
            version_status: Some("recommended".to_string()),
            observed_bandwidth: 2048,
            exit: true,
            stable: false,
            contact: None,
        };
        let snapshot = detail.into_snapshot().unwrap();
        assert_eq!(snapshot.observed_bandwidth_kbps, 2.0);
        assert_eq!(snapshot.version, VersionStatus::Recommended);
        assert!(snapshot.exit_capable);
    }

    #[test]
    fn detail_with_unrecognized_version_is_unknown() {
        let detail = DetailResponse {
            running: true,
            version_status: None,
            observed_bandwidth: 0,
            exit: false,
            stable: false,
            contact: None,
        };
        assert!(detail.into_snapshot().is_none());
    }

    #[test]
    fn detail_maps_old_releases_to_unrecommended() {
        for status in ["unrecommended", "experimental", "old"] {
            let detail = DetailResponse {
                running: false,
                version_status: Some(status.to_string()),
                observed_bandwidth: 1024,
                exit: false,
                stable: true,
                contact: Some("ops@example.net".to_string()),
            };
            assert_eq!(detail.into_snapshot().unwrap().version, VersionStatus::Unrecommended);
        }
    }
}
