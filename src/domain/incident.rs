//! Incident reports, their pre-submission drafts and pin metadata.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    lenient_analysis, AnalysisResult, ContentAddress, Coordinates, IncidentType, Severity,
};

/// Language tag recorded when the reporter does not send one.
pub const DEFAULT_LANGUAGE: &str = "en";

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

// ============================================================================
// Pinned record
// ============================================================================

/// One incident report as pinned to IPFS. Immutable once pinned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReport {
    #[serde(rename = "type")]
    pub incident_type: IncidentType,

    pub severity: Severity,

    /// Location exactly as entered by the reporter.
    pub location: String,

    /// Parsed or geocoded coordinates for `location`, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    pub description: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Content address of the attached media, if any.
    #[serde(default)]
    pub media_hash: Option<ContentAddress>,

    #[serde(default, deserialize_with = "lenient_analysis", skip_serializing_if = "Option::is_none")]
    pub media_analysis: Option<AnalysisResult>,

    #[serde(default, deserialize_with = "lenient_analysis", skip_serializing_if = "Option::is_none")]
    pub text_analysis: Option<AnalysisResult>,

    /// Server-assigned creation time.
    pub timestamp: DateTime<Utc>,
}

impl IncidentReport {
    pub fn has_media(&self) -> bool {
        self.media_hash.is_some()
    }

    /// Whether the attached media was flagged as likely synthetic.
    pub fn media_flagged_synthetic(&self) -> bool {
        self.media_analysis
            .as_ref()
            .and_then(AnalysisResult::as_media)
            .is_some_and(|m| m.is_synthetic)
    }

    /// Pin name: `<project>_Incident_Report_<epoch_ms>`.
    pub fn pin_name(&self, project: &str) -> String {
        format!(
            "{}_Incident_Report_{}",
            project,
            self.timestamp.timestamp_millis()
        )
    }

    pub fn pin_metadata(&self, project: &str) -> PinMetadata {
        PinMetadata {
            project: project.to_string(),
            incident_type: self.incident_type.label().to_string(),
            severity: self.severity.to_string(),
            language: self.language.clone(),
            has_media: self.has_media(),
        }
    }
}

// ============================================================================
// Drafts
// ============================================================================

/// Binary attachment sent with a report.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MediaAttachment {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Raw, unvalidated submission fields as received from the form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentDraft {
    pub incident_type: String,
    pub severity: String,
    pub location: String,
    pub description: String,
    pub language: Option<String>,
    pub media: Option<MediaAttachment>,
    pub media_analysis: Option<AnalysisResult>,
    pub text_analysis: Option<AnalysisResult>,
}

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Draft fields after validation, before the server assigns a timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDraft {
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub location: String,
    pub description: String,
    pub language: String,
    pub media: Option<MediaAttachment>,
    pub media_analysis: Option<AnalysisResult>,
    pub text_analysis: Option<AnalysisResult>,
}

impl IncidentDraft {
    /// Validate every field. Performs no I/O. Location and description are
    /// kept exactly as entered; whitespace only matters for the blank check.
    pub fn validate(self) -> Result<ValidatedDraft, FieldError> {
        if self.description.trim().is_empty() {
            return Err(FieldError::new("description", "description is required"));
        }

        if self.location.trim().is_empty() {
            return Err(FieldError::new("location", "location is required"));
        }

        let severity: Severity = self
            .severity
            .parse()
            .map_err(|e: String| FieldError::new("severity", e))?;

        let incident_type: IncidentType = self
            .incident_type
            .parse()
            .map_err(|e: String| FieldError::new("type", e))?;

        if let Some(analysis) = &self.media_analysis {
            if analysis.as_media().is_none() {
                return Err(FieldError::new(
                    "mediaAnalysis",
                    format!("expected media-authenticity, got {}", analysis.kind()),
                ));
            }
        }
        if let Some(analysis) = &self.text_analysis {
            if analysis.as_text().is_none() {
                return Err(FieldError::new(
                    "textAnalysis",
                    format!("expected text-classification, got {}", analysis.kind()),
                ));
            }
        }

        let media = match self.media {
            Some(m) if m.is_empty() => None,
            other => other,
        };

        let language = self
            .language
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(default_language);

        Ok(ValidatedDraft {
            incident_type,
            severity,
            location: self.location,
            description: self.description,
            language,
            media,
            media_analysis: self.media_analysis,
            text_analysis: self.text_analysis,
        })
    }
}

impl ValidatedDraft {
    /// Finalize into the record that gets pinned.
    pub fn into_report(
        self,
        media_hash: Option<ContentAddress>,
        coordinates: Option<Coordinates>,
        timestamp: DateTime<Utc>,
    ) -> IncidentReport {
        IncidentReport {
            incident_type: self.incident_type,
            severity: self.severity,
            location: self.location,
            coordinates,
            description: self.description,
            language: self.language,
            media_hash,
            media_analysis: self.media_analysis,
            text_analysis: self.text_analysis,
            timestamp,
        }
    }
}

// ============================================================================
// Pin metadata
// ============================================================================

/// Key/value tags attached to a pin so listings can be filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinMetadata {
    pub project: String,
    pub incident_type: String,
    pub severity: String,
    pub language: String,
    pub has_media: bool,
}

impl PinMetadata {
    pub fn to_keyvalues(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("project".to_string(), self.project.clone()),
            ("type".to_string(), self.incident_type.clone()),
            ("severity".to_string(), self.severity.clone()),
            ("language".to_string(), self.language.clone()),
            ("hasMedia".to_string(), self.has_media.to_string()),
        ])
    }

    /// Returns `None` when the pin carries no project tag.
    pub fn from_keyvalues(keyvalues: &BTreeMap<String, String>) -> Option<Self> {
        let project = keyvalues.get("project")?.clone();
        let get = |k: &str| keyvalues.get(k).cloned().unwrap_or_default();
        Some(Self {
            project,
            incident_type: get("type"),
            severity: get("severity"),
            language: get("language"),
            has_media: keyvalues.get("hasMedia").is_some_and(|v| v == "true"),
        })
    }
}

/// A pin listed by the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedContentReference {
    pub cid: ContentAddress,
    pub name: Option<String>,
    pub keyvalues: BTreeMap<String, String>,
    pub pinned_at: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

impl PinnedContentReference {
    pub fn metadata(&self) -> Option<PinMetadata> {
        PinMetadata::from_keyvalues(&self.keyvalues)
    }
}

// ============================================================================
// Listing
// ============================================================================

/// A report read back through the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedIncident {
    pub cid: ContentAddress,
    #[serde(flatten)]
    pub report: IncidentReport,
}

/// Which dashboard view the incident set supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedView {
    /// At least one incident loaded.
    Incidents,
    /// Nothing retrievable; show the generic community map instead of an error.
    CommunityFallback,
}

/// Dashboard working set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentFeed {
    pub view: FeedView,
    pub incidents: Vec<ListedIncident>,
    /// References that could not be fetched or decoded.
    pub skipped: usize,
}

impl IncidentFeed {
    pub fn new(incidents: Vec<ListedIncident>, skipped: usize) -> Self {
        let view = if incidents.is_empty() {
            FeedView::CommunityFallback
        } else {
            FeedView::Incidents
        };
        Self {
            view,
            incidents,
            skipped,
        }
    }
}

/// Newest first; ties broken by content address so output is deterministic.
pub fn sort_newest_first(incidents: &mut [ListedIncident]) {
    incidents.sort_by(|a, b| {
        b.report
            .timestamp
            .cmp(&a.report.timestamp)
            .then_with(|| a.cid.cmp(&b.cid))
    });
}
