//! Windows Update collector.
//!
//! Searching for pending updates takes seconds to minutes, far longer than a
//! scrape may take. A dedicated apartment thread therefore refreshes a
//! [`SnapshotCache`] on its own schedule and scrapes replay whatever the last
//! cycle produced. A failed cycle clears the cache, and scrapes then report
//! [`CollectError::NoData`] rather than an empty result, so "no pending
//! updates" and "search broken" stay distinguishable.

mod cache;
mod poller;
mod walker;

pub use cache::{SnapshotCache, UpdateSnapshot};
pub use poller::{poll_loop, refresh};
pub use walker::{
    PendingUpdateRecord, SEARCH_CRITERIA, fetch_updates, primary_category, read_update,
};

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::collector::sample::{MetricDesc, MetricKind, Sample};
use crate::collector::traits::{CollectError, Collector};
use crate::com::apartment::Apartment;
use crate::com::traits::UpdateAgentBackend;
use crate::util::{deserialize_duration, format_duration};

pub const NAME: &str = "update";

pub static PENDING_INFO: MetricDesc = MetricDesc {
    name: "windows_update_pending_info",
    help: "Expose information for a single pending update item.",
    kind: MetricKind::Gauge,
    labels: &["category", "severity", "title"],
};

pub static QUERY_DURATION: MetricDesc = MetricDesc {
    name: "windows_update_scrape_query_duration_seconds",
    help: "Duration of the last scrape query to the Windows Update API.",
    kind: MetricKind::Gauge,
    labels: &[],
};

pub static SCRAPE_TIMESTAMP: MetricDesc = MetricDesc {
    name: "windows_update_scrape_timestamp_seconds",
    help: "Timestamp of the last scrape.",
    kind: MetricKind::Gauge,
    labels: &[],
};

/// Update collector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateConfig {
    /// Search the online catalog instead of the local cache only.
    pub online: bool,
    /// Time between two searches.
    #[serde(deserialize_with = "deserialize_duration")]
    pub scrape_interval: Duration,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            online: false,
            scrape_interval: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// Collector exposing pending Windows updates from a periodically refreshed cache.
pub struct UpdateCollector<B: UpdateAgentBackend> {
    config: UpdateConfig,
    backend: B,
    cache: Arc<SnapshotCache>,
    shutdown: Option<Sender<()>>,
    apartment: Option<Apartment>,
}

impl<B: UpdateAgentBackend> UpdateCollector<B> {
    pub fn new(config: UpdateConfig, backend: B) -> Self {
        Self {
            config,
            backend,
            cache: Arc::new(SnapshotCache::new()),
            shutdown: None,
            apartment: None,
        }
    }

    /// Shared snapshot cache.
    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }
}

impl<B: UpdateAgentBackend> Collector for UpdateCollector<B> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn build(&mut self) -> Result<(), CollectError> {
        if self.config.scrape_interval.is_zero() {
            return Err(CollectError::Config(
                "update scrape_interval must be greater than zero".to_string(),
            ));
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let backend = self.backend.clone();
        let online = self.config.online;
        let interval = self.config.scrape_interval;
        let cache = self.cache.clone();

        let apartment = Apartment::start(
            "update-com",
            self.backend.runtime(),
            move || backend.connect(online),
            move |session| {
                poll_loop(session, &cache, interval, &shutdown_rx);
            },
        )
        .map_err(CollectError::Init)?;

        info!(
            online,
            scrape_interval = %format_duration(interval),
            "update collector ready"
        );
        self.shutdown = Some(shutdown_tx);
        self.apartment = Some(apartment);
        Ok(())
    }

    fn collect(&self, sink: &mut Vec<Sample>) -> Result<(), CollectError> {
        let snapshot = self.cache.load().ok_or(CollectError::NoData)?;
        sink.extend(snapshot.samples.iter().cloned());
        Ok(())
    }

    fn close(&mut self) -> Result<(), CollectError> {
        // Disconnecting the shutdown channel wakes the idle wait; a search in
        // progress runs to completion first.
        self.shutdown = None;
        if let Some(mut apartment) = self.apartment.take() {
            apartment.join();
        }
        Ok(())
    }
}

impl<B: UpdateAgentBackend> Drop for UpdateCollector<B> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = UpdateConfig::default();
        assert!(!config.online);
        assert_eq!(config.scrape_interval, Duration::from_secs(21600));
    }

    #[test]
    fn test_config_from_json() {
        let config: UpdateConfig =
            serde_json::from_str(r#"{"online": true, "scrape_interval": "15m"}"#).unwrap();
        assert!(config.online);
        assert_eq!(config.scrape_interval, Duration::from_secs(900));

        let partial: UpdateConfig = serde_json::from_str(r#"{"online": true}"#).unwrap();
        assert_eq!(partial.scrape_interval, UpdateConfig::default().scrape_interval);

        assert!(serde_json::from_str::<UpdateConfig>(r#"{"scrape_interval": "soon"}"#).is_err());
    }

    #[test]
    fn test_collect_before_first_cycle_is_no_data() {
        let collector = UpdateCollector::new(
            UpdateConfig::default(),
            crate::com::mock::MockUpdateAgent::two_pending(),
        );
        let mut sink = Vec::new();
        assert_eq!(collector.collect(&mut sink), Err(CollectError::NoData));
        assert!(sink.is_empty());
    }
}
