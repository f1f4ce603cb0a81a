//! Advisory analysis handlers: text classification and media authenticity.
//!
//! Neither endpoint touches stored reports; clients attach the results to a
//! submission if they want them recorded.

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::Json;
use tracing::{info, instrument};

use crate::api::error::{invalid_body, missing_field, validation_error, ApiError};
use crate::api::handlers::incidents::{is_multipart, read_file};
use crate::api::types::{AnalyzeMediaRequest, AnalyzeTextRequest};
use crate::domain::{MediaAuthenticity, MediaType, TextClassification};
use crate::infra::{MediaSource, RelayError};
use crate::server::AppState;

/// Classify free text into an incident category
#[instrument(skip_all)]
pub async fn analyze_text(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzeTextRequest>,
) -> Result<Json<TextClassification>, ApiError> {
    let text = payload.text.ok_or_else(|| missing_field("text"))?;
    let classification = state
        .classifier
        .classify(&text)
        .await
        .map_err(|e| ApiError::from_relay(e, "Text analysis failed"))?;

    info!(
        label = %classification.label,
        confidence = classification.confidence,
        "Classified text"
    );
    Ok(Json(classification))
}

fn parse_media_type(raw: &str) -> Result<MediaType, ApiError> {
    raw.parse().map_err(|e: String| validation_error("mediaType", e))
}

async fn media_from_multipart(
    mut multipart: Multipart,
) -> Result<(MediaSource, MediaType), ApiError> {
    let mut media = None;
    let mut media_type = None;
    let mut media_url = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| invalid_body(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "media" => media = Some(read_file(field).await?),
            "mediaType" => {
                let text = field.text().await.map_err(|e| invalid_body(e.body_text()))?;
                media_type = Some(parse_media_type(&text)?);
            }
            "mediaUrl" => {
                media_url = Some(field.text().await.map_err(|e| invalid_body(e.body_text()))?);
            }
            _ => {}
        }
    }

    match (media.filter(|m| !m.is_empty()), media_url) {
        (Some(file), _) => {
            let media_type = media_type.unwrap_or_else(|| MediaType::from_mime(&file.content_type));
            Ok((MediaSource::Inline(file), media_type))
        }
        (None, Some(url)) if !url.trim().is_empty() => {
            let media_type = media_type.ok_or_else(|| missing_field("mediaType"))?;
            Ok((MediaSource::Url(url.trim().to_string()), media_type))
        }
        _ => Err(missing_field("media")),
    }
}

/// Check media for signs of synthesis
///
/// Accepts JSON `{mediaUrl, mediaType}` or a multipart upload with a `media`
/// file and optional `mediaType` (inferred from the file's MIME type).
#[instrument(skip_all)]
pub async fn analyze_media(
    State(state): State<AppState>,
    req: Request,
) -> Result<Json<MediaAuthenticity>, ApiError> {
    let (source, media_type) = if is_multipart(&req) {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|e| invalid_body(e.body_text()))?;
        media_from_multipart(multipart).await?
    } else {
        let Json(payload) = Json::<AnalyzeMediaRequest>::from_request(req, &state)
            .await
            .map_err(|e| invalid_body(e.body_text()))?;
        let url = payload
            .media_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| missing_field("mediaUrl"))?;
        let media_type = payload
            .media_type
            .as_deref()
            .ok_or_else(|| missing_field("mediaType"))
            .and_then(parse_media_type)?;
        (MediaSource::Url(url), media_type)
    };

    let checker = state.media_checker.clone().ok_or_else(|| {
        ApiError::from(RelayError::Configuration(
            "media authenticity provider is not configured".into(),
        ))
    })?;

    let result = checker
        .check(source, media_type)
        .await
        .map_err(|e| ApiError::from_relay(e, "Media analysis failed"))?;

    info!(
        media_type = ?result.media_type,
        is_synthetic = result.is_synthetic,
        confidence = ?result.confidence,
        "Checked media authenticity"
    );
    Ok(Json(result))
}
