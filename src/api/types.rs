//! Shared request and response types for REST API handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AnalyticsReport, ContentAddress, FeedView, IncidentReport, ListedIncident, PaymentRecord,
    PremiumAccess,
};

// ============================================================================
// Incident types
// ============================================================================

/// Response for a successful submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIncidentResponse {
    pub success: bool,
    /// Content address of the pinned JSON record
    pub ipfs_hash: ContentAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_hash: Option<ContentAddress>,
}

/// Content addresses of every record tagged with the project.
#[derive(Debug, Serialize)]
pub struct IncidentListResponse {
    pub success: bool,
    pub hashes: Vec<ContentAddress>,
}

#[derive(Debug, Serialize)]
pub struct IncidentFeedResponse {
    pub success: bool,
    pub view: FeedView,
    pub incidents: Vec<ListedIncident>,
    pub skipped: usize,
}

#[derive(Debug, Serialize)]
pub struct IncidentResponse {
    pub success: bool,
    pub incident: IncidentReport,
}

// ============================================================================
// Analysis types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AnalyzeTextRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// JSON form of a media authenticity request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeMediaRequest {
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub proof: Option<serde_json::Value>,
    #[serde(default)]
    pub action: Option<String>,
}

// ============================================================================
// Premium types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    #[serde(default)]
    pub address: Option<String>,
}

/// Expiry summary returned after a payment and with analytics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessWindow {
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
    pub days_remaining: Option<i64>,
}

impl From<&PremiumAccess> for AccessWindow {
    fn from(access: &PremiumAccess) -> Self {
        Self {
            expires_at: access.expires_at,
            days_remaining: access.days_remaining,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordPaymentResponse {
    pub success: bool,
    pub message: String,
    pub payment: AccessWindow,
}

#[derive(Debug, Serialize)]
pub struct PaymentHistoryResponse {
    pub success: bool,
    pub payments: Vec<PaymentRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumAnalyticsResponse {
    pub success: bool,
    pub data: AnalyticsReport,
    pub premium_access: AccessWindow,
}
