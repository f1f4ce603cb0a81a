//! Report submission pipeline.
//!
//! Validation happens before any network call. Media is pinned before the
//! JSON record; a failure between the two leaves the media pinned and
//! unreferenced, which is logged and counted but never cleaned up.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::domain::{ContentAddress, Coordinates, IncidentDraft, IncidentReport};
use crate::metrics::{metric_names, timed, MetricsRegistry};

use super::retry::{Retry, RetryConfig};
use super::{Geocoder, JsonPin, PinningService, RelayError, Result};

/// Default project tag written into pin metadata.
pub const DEFAULT_PROJECT_TAG: &str = "Baxela";

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    /// Content address of the JSON record
    pub cid: ContentAddress,
    /// Content address of the attached media, if any
    pub media_cid: Option<ContentAddress>,
    pub report: IncidentReport,
}

pub struct SubmissionService {
    pinning: Option<Arc<dyn PinningService>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    metrics: Arc<MetricsRegistry>,
    project: String,
    retry: Retry,
}

impl SubmissionService {
    /// `pinning` is `None` when provider credentials are not configured;
    /// every submission then fails with a configuration error.
    pub fn new(
        pinning: Option<Arc<dyn PinningService>>,
        metrics: Arc<MetricsRegistry>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            pinning,
            geocoder: None,
            metrics,
            project: project.into(),
            retry: Retry::default(),
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = Retry::new(config);
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn is_configured(&self) -> bool {
        self.pinning.is_some()
    }

    pub async fn submit(&self, draft: IncidentDraft) -> Result<SubmissionReceipt> {
        self.submit_at(draft, Utc::now()).await
    }

    /// Submit with an explicit server timestamp.
    pub async fn submit_at(
        &self,
        draft: IncidentDraft,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt> {
        let result = timed(
            &self.metrics,
            metric_names::SUBMIT_LATENCY,
            self.run_pipeline(draft, now),
        )
        .await;

        let counter = match &result {
            Ok(_) => metric_names::INCIDENTS_SUBMITTED,
            Err(RelayError::Validation { .. }) => metric_names::INCIDENTS_REJECTED,
            Err(_) => metric_names::INCIDENTS_FAILED,
        };
        self.metrics.inc_counter(counter).await;
        result
    }

    #[instrument(skip(self, draft), fields(project = %self.project))]
    async fn run_pipeline(
        &self,
        draft: IncidentDraft,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt> {
        let pinning = self.pinning.clone().ok_or_else(|| {
            RelayError::Configuration("pinning provider credentials are not configured".into())
        })?;

        let mut validated = draft.validate()?;
        let coordinates = self.resolve_coordinates(&validated.location).await;

        let media_cid = match validated.media.take() {
            Some(media) => {
                let receipt = self
                    .retry
                    .run("pin_media", || {
                        let pinning = pinning.clone();
                        let media = media.clone();
                        async move { pinning.pin_file(media).await }
                    })
                    .await
                    .into_result()?;
                self.metrics.inc_counter(metric_names::MEDIA_PINNED).await;
                info!(media_cid = %receipt.cid, "Pinned incident media");
                Some(receipt.cid)
            }
            None => None,
        };

        let report = validated.into_report(media_cid.clone(), coordinates, now);
        let content = serde_json::to_value(&report)
            .map_err(|e| RelayError::Internal(format!("failed to encode report: {e}")))?;
        let pin = JsonPin {
            name: report.pin_name(&self.project),
            content,
            metadata: report.pin_metadata(&self.project),
        };

        let record = self
            .retry
            .run("pin_record", || {
                let pinning = pinning.clone();
                let pin = pin.clone();
                async move { pinning.pin_json(pin).await }
            })
            .await
            .into_result();

        let record = match record {
            Ok(receipt) => receipt,
            Err(e) => {
                if let Some(orphan) = &media_cid {
                    warn!(media_cid = %orphan, error = %e, "Record pin failed; media left orphaned");
                    self.metrics.inc_counter(metric_names::MEDIA_ORPHANED).await;
                }
                return Err(e);
            }
        };

        info!(
            cid = %record.cid,
            incident_type = %report.incident_type,
            severity = report.severity.value(),
            has_media = report.has_media(),
            "Incident report pinned"
        );

        Ok(SubmissionReceipt {
            cid: record.cid,
            media_cid,
            report,
        })
    }

    /// Parse `"<lat>, <lon>"` text, else ask the geocoder. Never fails.
    async fn resolve_coordinates(&self, location: &str) -> Option<Coordinates> {
        if let Some(coords) = Coordinates::parse(location) {
            return Some(coords);
        }
        let geocoder = self.geocoder.as_ref()?;
        match geocoder.geocode(location.trim()).await {
            Ok(coords) => coords,
            Err(e) => {
                warn!(error = %e, "Geocoding failed; continuing without coordinates");
                None
            }
        }
    }
}
