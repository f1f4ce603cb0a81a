//! Incident listing through the pinning provider and the gateway.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use crate::domain::{sort_newest_first, ContentAddress, IncidentFeed, IncidentReport, ListedIncident};
use crate::metrics::{metric_names, timed, MetricsRegistry};

use super::{ContentGateway, PinningService, RelayError, Result};

/// Default number of concurrent gateway fetches.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Incidents that loaded, plus how many references were skipped.
#[derive(Debug, Clone, Default)]
pub struct LoadedIncidents {
    pub incidents: Vec<ListedIncident>,
    pub skipped: usize,
}

pub struct IncidentDirectory {
    pinning: Option<Arc<dyn PinningService>>,
    gateway: Arc<dyn ContentGateway>,
    metrics: Arc<MetricsRegistry>,
    project: String,
    concurrency: usize,
}

fn decode_report(cid: &ContentAddress, value: serde_json::Value) -> Result<IncidentReport> {
    serde_json::from_value(value).map_err(|e| RelayError::Decode(format!("{cid}: {e}")))
}

impl IncidentDirectory {
    pub fn new(
        pinning: Option<Arc<dyn PinningService>>,
        gateway: Arc<dyn ContentGateway>,
        metrics: Arc<MetricsRegistry>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            pinning,
            gateway,
            metrics,
            project: project.into(),
            concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Content addresses of every pinned record tagged with the project.
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn list_addresses(&self) -> Result<Vec<ContentAddress>> {
        let pinning = self.pinning.as_ref().ok_or_else(|| {
            RelayError::Configuration("pinning provider credentials are not configured".into())
        })?;

        let addresses: Vec<ContentAddress> = pinning
            .list_pins(&self.project)
            .await?
            .into_iter()
            .filter(|pin| pin.keyvalues.get("project").is_some_and(|p| *p == self.project))
            .map(|pin| pin.cid)
            .collect();

        self.metrics
            .add_counter(metric_names::INCIDENTS_LISTED, addresses.len() as u64)
            .await;
        Ok(addresses)
    }

    /// Fetch one record through the gateway.
    pub async fn fetch_one(&self, cid: &ContentAddress) -> Result<IncidentReport> {
        let value = self.gateway.fetch_json(cid).await?;
        decode_report(cid, value)
    }

    /// Fetch every listed record, skipping any that fail to load or decode.
    /// Sorted newest first.
    pub async fn load_incidents(&self) -> Result<LoadedIncidents> {
        let addresses = self.list_addresses().await?;
        let total = addresses.len();

        let results: Vec<(ContentAddress, Result<IncidentReport>)> = stream::iter(addresses)
            .map(|cid| {
                let gateway = self.gateway.clone();
                async move {
                    let report = match gateway.fetch_json(&cid).await {
                        Ok(value) => decode_report(&cid, value),
                        Err(e) => Err(e),
                    };
                    (cid, report)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut incidents = Vec::with_capacity(total);
        let mut skipped = 0;
        for (cid, result) in results {
            match result {
                Ok(report) => incidents.push(ListedIncident { cid, report }),
                Err(e) => {
                    warn!(cid = %cid, error = %e, "Skipping unreadable incident");
                    skipped += 1;
                }
            }
        }
        sort_newest_first(&mut incidents);

        if skipped > 0 {
            self.metrics
                .add_counter(metric_names::FETCH_SKIPPED, skipped as u64)
                .await;
        }
        Ok(LoadedIncidents { incidents, skipped })
    }

    /// Dashboard working set. Zero loaded incidents selects the fallback view.
    pub async fn feed(&self) -> Result<IncidentFeed> {
        let loaded = timed(&self.metrics, metric_names::FEED_LATENCY, self.load_incidents()).await?;
        self.metrics
            .set_gauge(metric_names::FEED_SIZE, loaded.incidents.len() as u64)
            .await;

        let feed = IncidentFeed::new(loaded.incidents, loaded.skipped);
        info!(
            view = ?feed.view,
            incidents = feed.incidents.len(),
            skipped = feed.skipped,
            "Built incident feed"
        );
        Ok(feed)
    }
}
