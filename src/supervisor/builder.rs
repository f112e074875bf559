//! Step-by-step assembly of a [`Supervisor`].

use std::sync::Arc;

use crate::{
    config::AppConfig, notifier::Notifier, persistence::traits::WatchRepository,
    providers::traits::StatusSource,
};

use super::{Supervisor, SupervisorError};

/// Collects the supervisor's components, then validates them in `build`.
pub struct SupervisorBuilder<R: WatchRepository + 'static> {
    config: Option<AppConfig>,
    repository: Option<Arc<R>>,
    source: Option<Arc<dyn StatusSource>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl<R: WatchRepository + 'static> Default for SupervisorBuilder<R> {
    fn default() -> Self {
        Self { config: None, repository: None, source: None, notifier: None }
    }
}

impl<R: WatchRepository + 'static> SupervisorBuilder<R> {
    /// An empty builder; every component still has to be supplied.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies the application configuration.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Supplies the watch repository.
    pub fn repository(mut self, repository: Arc<R>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Supplies the relay status source.
    pub fn source(mut self, source: Arc<dyn StatusSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Supplies the notification transport.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Checks that every component was supplied and builds the supervisor.
    ///
    /// The repository is the single source of truth for what is watched;
    /// the initial load is only logged here so a misconfigured database
    /// shows up at startup rather than one poll interval later.
    pub async fn build(self) -> Result<Supervisor<R>, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let repository = self.repository.ok_or(SupervisorError::MissingRepository)?;
        let source = self.source.ok_or(SupervisorError::MissingStatusSource)?;
        let notifier = self.notifier.ok_or(SupervisorError::MissingNotifier)?;

        let entries = repository.list_watch_entries().await?;
        tracing::info!(count = entries.len(), "Loaded confirmed watch entries from repository.");

        Ok(Supervisor::new(config, repository, source, notifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        notifier::MockNotifier, persistence::traits::MockWatchRepository,
        providers::traits::MockStatusSource,
    };

    #[tokio::test]
    async fn build_succeeds_with_all_components() {
        let mut repository = MockWatchRepository::new();
        repository.expect_list_watch_entries().returning(|| Ok(vec![]));

        let result = SupervisorBuilder::new()
            .config(AppConfig::default())
            .repository(Arc::new(repository))
            .source(Arc::new(MockStatusSource::new()))
            .notifier(Arc::new(MockNotifier::new()))
            .build()
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn build_fails_if_config_is_missing() {
        let result = SupervisorBuilder::<MockWatchRepository>::new()
            .repository(Arc::new(MockWatchRepository::new()))
            .source(Arc::new(MockStatusSource::new()))
            .notifier(Arc::new(MockNotifier::new()))
            .build()
            .await;

        assert!(matches!(result, Err(SupervisorError::MissingConfig)));
    }

    #[tokio::test]
    async fn build_fails_if_repository_is_missing() {
        let result = SupervisorBuilder::<MockWatchRepository>::new()
            .config(AppConfig::default())
            .source(Arc::new(MockStatusSource::new()))
            .notifier(Arc::new(MockNotifier::new()))
            .build()
            .await;

        assert!(matches!(result, Err(SupervisorError::MissingRepository)));
    }
}
