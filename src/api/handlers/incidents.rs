//! Incident report handlers
//!
//! # Endpoints
//!
//! - `POST /api/v1/incidents` - Submit a report (multipart form or JSON)
//! - `GET /api/v1/incidents` - Content addresses of every pinned report
//! - `GET /api/v1/incidents/feed` - Fetched reports for the dashboard
//! - `GET /api/v1/incidents/:cid` - A single report

use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::api::error::{invalid_body, validation_error, ApiError, ErrorCode};
use crate::api::types::{
    IncidentFeedResponse, IncidentListResponse, IncidentResponse, SubmitIncidentResponse,
};
use crate::domain::{AnalysisResult, ContentAddress, IncidentDraft, MediaAttachment};
use crate::server::AppState;

/// JSON form of a submission, also accepted as the multipart `data` field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncidentDraftBody {
    #[serde(rename = "type", default)]
    incident_type: String,
    #[serde(default)]
    severity: Value,
    #[serde(default)]
    location: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    media_analysis: Option<Value>,
    #[serde(default)]
    text_analysis: Option<Value>,
}

/// Severity arrives as `3`, `3.0` or `"3"`; validation happens later.
fn severity_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 => (f as i64).to_string(),
            _ => n.to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_analysis(field: &str, value: Option<Value>) -> Result<Option<AnalysisResult>, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| validation_error(field, format!("{field} is not a recognised analysis: {e}"))),
    }
}

fn parse_analysis_text(field: &str, text: &str) -> Result<Option<AnalysisResult>, ApiError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(text)
        .map_err(|e| validation_error(field, format!("{field} must be JSON: {e}")))?;
    parse_analysis(field, Some(value))
}

impl IncidentDraftBody {
    fn into_draft(self) -> Result<IncidentDraft, ApiError> {
        Ok(IncidentDraft {
            incident_type: self.incident_type,
            severity: severity_text(&self.severity),
            location: self.location,
            description: self.description,
            language: self.language,
            media: None,
            media_analysis: parse_analysis("mediaAnalysis", self.media_analysis)?,
            text_analysis: parse_analysis("textAnalysis", self.text_analysis)?,
        })
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(ErrorCode::PayloadTooLarge, "Upload exceeds the size limit")
    } else {
        invalid_body(err.body_text())
    }
}

pub(crate) fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().to_ascii_lowercase().starts_with("multipart/form-data"))
}

/// Read one uploaded file field.
pub(crate) async fn read_file(
    field: axum::extract::multipart::Field<'_>,
) -> Result<MediaAttachment, ApiError> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field.bytes().await.map_err(multipart_error)?;
    Ok(MediaAttachment {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    })
}

async fn draft_from_multipart(mut multipart: Multipart) -> Result<IncidentDraft, ApiError> {
    let mut draft = IncidentDraft::default();
    let mut data: Option<IncidentDraftBody> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "media" {
            draft.media = Some(read_file(field).await?);
            continue;
        }

        let text = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "data" => {
                data = Some(
                    serde_json::from_str(&text)
                        .map_err(|e| invalid_body(format!("data must be a JSON object: {e}")))?,
                );
            }
            "type" => draft.incident_type = text,
            "severity" => draft.severity = text,
            "location" => draft.location = text,
            "description" => draft.description = text,
            "language" => draft.language = Some(text),
            "mediaAnalysis" => draft.media_analysis = parse_analysis_text("mediaAnalysis", &text)?,
            "textAnalysis" => draft.text_analysis = parse_analysis_text("textAnalysis", &text)?,
            _ => {}
        }
    }

    match data {
        Some(body) => {
            let media = draft.media.take();
            let mut from_data = body.into_draft()?;
            from_data.media = media;
            Ok(from_data)
        }
        None => Ok(draft),
    }
}

/// Submit an incident report
///
/// Accepts `multipart/form-data` with the report fields and an optional
/// `media` file, or a single `data` field holding the JSON form. A plain JSON
/// body is accepted too.
///
/// # Response
///
/// ```json
/// { "success": true, "ipfsHash": "bafk...", "mediaHash": "bafk..." }
/// ```
#[instrument(skip_all)]
pub async fn submit_incident(
    State(state): State<AppState>,
    req: Request,
) -> Result<Json<SubmitIncidentResponse>, ApiError> {
    let draft = if is_multipart(&req) {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|e| invalid_body(e.body_text()))?;
        draft_from_multipart(multipart).await?
    } else {
        let Json(body) = Json::<IncidentDraftBody>::from_request(req, &state)
            .await
            .map_err(|e| {
                if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    ApiError::new(ErrorCode::PayloadTooLarge, "Upload exceeds the size limit")
                } else {
                    invalid_body(e.body_text())
                }
            })?;
        body.into_draft()?
    };

    let receipt = state
        .submission
        .submit(draft)
        .await
        .map_err(|e| ApiError::from_relay(e, "Submission failed"))?;

    info!(cid = %receipt.cid, "Incident submitted");
    Ok(Json(SubmitIncidentResponse {
        success: true,
        ipfs_hash: receipt.cid,
        media_hash: receipt.media_cid,
    }))
}

/// List content addresses of every report tagged with the project
#[instrument(skip_all)]
pub async fn list_incidents(
    State(state): State<AppState>,
) -> Result<Json<IncidentListResponse>, ApiError> {
    let hashes = state
        .directory
        .list_addresses()
        .await
        .map_err(|e| ApiError::from_relay(e, "Failed to list incidents"))?;
    Ok(Json(IncidentListResponse {
        success: true,
        hashes,
    }))
}

/// Fetched and sorted reports; an empty set selects the fallback view
#[instrument(skip_all)]
pub async fn incident_feed(
    State(state): State<AppState>,
) -> Result<Json<IncidentFeedResponse>, ApiError> {
    let feed = state
        .directory
        .feed()
        .await
        .map_err(|e| ApiError::from_relay(e, "Failed to load incidents"))?;
    Ok(Json(IncidentFeedResponse {
        success: true,
        view: feed.view,
        incidents: feed.incidents,
        skipped: feed.skipped,
    }))
}

/// Fetch one report through the gateway
#[instrument(skip(state))]
pub async fn get_incident(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> Result<Json<IncidentResponse>, ApiError> {
    let cid = ContentAddress::parse(&cid).map_err(|e| validation_error("cid", e))?;
    let incident = state
        .directory
        .fetch_one(&cid)
        .await
        .map_err(|e| ApiError::from_relay(e, "Failed to load incident"))?;
    Ok(Json(IncidentResponse {
        success: true,
        incident,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_text_forms() {
        assert_eq!(severity_text(&json!(3)), "3");
        assert_eq!(severity_text(&json!(4.0)), "4");
        assert_eq!(severity_text(&json!("2")), "2");
        assert_eq!(severity_text(&json!(2.5)), "2.5");
        assert_eq!(severity_text(&Value::Null), "");
    }

    #[test]
    fn test_json_body_into_draft() {
        let body: IncidentDraftBody = serde_json::from_value(json!({
            "type": "Vote Buying",
            "severity": 3,
            "location": "40.7128, -74.0060",
            "description": "Saw cash exchanged at polling station",
            "textAnalysis": {
                "kind": "text-classification",
                "label": "vote_buying",
                "confidence": 0.8
            }
        }))
        .unwrap();
        let draft = body.into_draft().unwrap();
        assert_eq!(draft.severity, "3");
        assert!(draft.text_analysis.unwrap().as_text().is_some());
    }

    #[test]
    fn test_unrecognised_analysis_rejected() {
        let body: IncidentDraftBody = serde_json::from_value(json!({
            "mediaAnalysis": {"confidence": 0.2}
        }))
        .unwrap();
        let err = body.into_draft().unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
