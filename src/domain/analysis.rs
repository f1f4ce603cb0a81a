//! Provider analysis results attached to incident reports.
//!
//! Each provider gets its own variant so downstream code never depends on an
//! untyped payload shape.

use serde::{Deserialize, Deserializer, Serialize};

/// Confidence above which a media authenticity model's output is reported as
/// likely synthetic.
pub const SYNTHETIC_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Coarse media type sent to the authenticity checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    /// Classify by MIME type; anything that is not an image is treated as video.
    pub fn from_mime(mime: &str) -> Self {
        if mime.trim().to_ascii_lowercase().starts_with("image/") {
            Self::Image
        } else {
            Self::Video
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            other => Err(format!("mediaType must be 'image' or 'video', got {other:?}")),
        }
    }
}

/// Score for one category in a text classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    #[serde(alias = "classification")]
    pub label: String,
    #[serde(alias = "value")]
    pub score: f64,
}

/// Output of a text classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextClassification {
    #[serde(alias = "classification")]
    pub label: String,
    pub confidence: f64,
    /// All category scores, highest first.
    #[serde(alias = "allScores", default)]
    pub scores: Vec<CategoryScore>,
}

/// Output of a media authenticity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAuthenticity {
    #[serde(alias = "isDeepfake")]
    pub is_synthetic: bool,
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Raw provider payload, kept for display only.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl MediaAuthenticity {
    /// Build a result from a model confidence using the synthetic threshold.
    pub fn from_confidence(
        media_type: MediaType,
        confidence: Option<f64>,
        raw: serde_json::Value,
    ) -> Self {
        Self {
            is_synthetic: confidence.is_some_and(|c| c > SYNTHETIC_CONFIDENCE_THRESHOLD),
            media_type,
            confidence,
            raw,
        }
    }
}

/// Tagged union of all analysis results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AnalysisResult {
    TextClassification(TextClassification),
    MediaAuthenticity(MediaAuthenticity),
}

impl AnalysisResult {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextClassification(_) => "text-classification",
            Self::MediaAuthenticity(_) => "media-authenticity",
        }
    }

    pub fn as_text(&self) -> Option<&TextClassification> {
        match self {
            Self::TextClassification(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_media(&self) -> Option<&MediaAuthenticity> {
        match self {
            Self::MediaAuthenticity(m) => Some(m),
            _ => None,
        }
    }
}

impl From<TextClassification> for AnalysisResult {
    fn from(value: TextClassification) -> Self {
        Self::TextClassification(value)
    }
}

impl From<MediaAuthenticity> for AnalysisResult {
    fn from(value: MediaAuthenticity) -> Self {
        Self::MediaAuthenticity(value)
    }
}

/// Deserialize an optional analysis, dropping payloads that do not match the
/// union (older records stored raw provider blobs).
pub fn lenient_analysis<'de, D>(deserializer: D) -> Result<Option<AnalysisResult>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}
