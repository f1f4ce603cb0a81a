//! Media authenticity checks through the Replicate predictions API.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::domain::{MediaAuthenticity, MediaType};

use super::http::{build_client, decode_json, ensure_success, env_non_empty, trim_base_url};
use super::{MediaAuthenticityChecker, MediaSource, RelayError, Result};

pub const DEFAULT_REPLICATE_API_URL: &str = "https://api.replicate.com/v1";
pub const DEFAULT_IMAGE_MODEL_VERSION: &str =
    "c75db81db6cbd809d93cc3b7e7a088a351a3349c9fa02b6d393e35e0d51ba799";
pub const DEFAULT_VIDEO_MODEL_VERSION: &str =
    "b437f7af97d3594ad86641048875f969f5e7b2e246824b81d5e3311b3536dd46";

const PROVIDER: &str = "replicate";
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: u32 = 60;

#[derive(Clone)]
pub struct ReplicateConfig {
    pub api_url: String,
    pub api_token: String,
    pub image_model_version: String,
    pub video_model_version: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ReplicateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicateConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &"<redacted>")
            .field("image_model_version", &self.image_model_version)
            .field("video_model_version", &self.video_model_version)
            .finish()
    }
}

impl ReplicateConfig {
    /// Returns `None` unless `REPLICATE_API_TOKEN` is set.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let api_token = env_non_empty("REPLICATE_API_TOKEN")?;
        Some(Self {
            api_url: trim_base_url(
                &env_non_empty("REPLICATE_API_URL")
                    .unwrap_or_else(|| DEFAULT_REPLICATE_API_URL.to_string()),
            ),
            api_token,
            image_model_version: env_non_empty("REPLICATE_IMAGE_MODEL_VERSION")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL_VERSION.to_string()),
            video_model_version: env_non_empty("REPLICATE_VIDEO_MODEL_VERSION")
                .unwrap_or_else(|| DEFAULT_VIDEO_MODEL_VERSION.to_string()),
            timeout,
        })
    }

    fn model_version(&self, media_type: MediaType) -> &str {
        match media_type {
            MediaType::Image => &self.image_model_version,
            MediaType::Video => &self.video_model_version,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: Option<String>,
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }
}

/// Pull a confidence score out of a model output. Accepts a bare number or
/// an object carrying `confidence`.
fn extract_confidence(output: &Value) -> Option<f64> {
    match output {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get("confidence").and_then(Value::as_f64),
        _ => None,
    }
}

/// Encode inline media as a data URI the predictions API accepts as input.
fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, BASE64.encode(bytes))
}

/// [`MediaAuthenticityChecker`] backed by Replicate.
pub struct ReplicateChecker {
    client: Client,
    config: ReplicateConfig,
}

impl ReplicateChecker {
    pub fn new(config: ReplicateConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            config,
        })
    }

    fn auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(&self.config.api_token)
    }

    async fn poll(&self, mut prediction: Prediction) -> Result<Prediction> {
        let mut polls = 0;
        while !prediction.is_terminal() {
            let Some(url) = prediction.urls.as_ref().and_then(|u| u.get.clone()) else {
                return Err(RelayError::Decode(format!(
                    "{PROVIDER}: prediction in status {} has no poll url",
                    prediction.status
                )));
            };
            if polls >= MAX_POLLS {
                return Err(RelayError::Timeout { provider: PROVIDER });
            }
            polls += 1;
            tokio::time::sleep(POLL_INTERVAL).await;

            let response = self
                .auth(self.client.get(&url))
                .send()
                .await
                .map_err(|e| RelayError::from_reqwest(PROVIDER, e))?;
            let response = ensure_success(PROVIDER, response).await?;
            prediction = decode_json(PROVIDER, response).await?;
        }
        Ok(prediction)
    }
}

#[async_trait]
impl MediaAuthenticityChecker for ReplicateChecker {
    #[instrument(skip(self, media))]
    async fn check(&self, media: MediaSource, media_type: MediaType) -> Result<MediaAuthenticity> {
        let input = match media {
            MediaSource::Url(url) => url,
            MediaSource::Inline(file) => data_uri(&file.content_type, &file.bytes),
        };
        let body = json!({
            "version": self.config.model_version(media_type),
            "input": { "image": input },
        });

        let response = self
            .auth(self.client.post(format!("{}/predictions", self.config.api_url)))
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, response).await?;
        let prediction = self.poll(decode_json(PROVIDER, response).await?).await?;

        if prediction.status != "succeeded" {
            warn!(
                prediction_id = ?prediction.id,
                status = %prediction.status,
                error = ?prediction.error,
                "Prediction did not succeed"
            );
            return Err(RelayError::upstream(
                PROVIDER,
                None,
                format!("prediction {}", prediction.status),
            ));
        }

        let confidence = extract_confidence(&prediction.output);
        debug!(prediction_id = ?prediction.id, ?confidence, "Prediction succeeded");
        Ok(MediaAuthenticity::from_confidence(
            media_type,
            confidence,
            prediction.output,
        ))
    }
}
