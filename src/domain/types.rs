//! Core value types shared by the submission, listing and premium flows.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Incident vocabulary
// ============================================================================

/// Fixed incident-category vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IncidentType {
    VoteBuying,
    BallotStuffing,
    Intimidation,
    Tampering,
    Misinformation,
    Other,
}

impl IncidentType {
    pub const ALL: [IncidentType; 6] = [
        IncidentType::VoteBuying,
        IncidentType::BallotStuffing,
        IncidentType::Intimidation,
        IncidentType::Tampering,
        IncidentType::Misinformation,
        IncidentType::Other,
    ];

    /// Label shown to reporters and stored in pinned records.
    pub fn label(&self) -> &'static str {
        match self {
            Self::VoteBuying => "Vote Buying",
            Self::BallotStuffing => "Ballot Stuffing",
            Self::Intimidation => "Intimidation",
            Self::Tampering => "Tampering",
            Self::Misinformation => "Misinformation",
            Self::Other => "Other",
        }
    }

    /// Snake-case label used by the text classifier.
    pub fn classifier_label(&self) -> &'static str {
        match self {
            Self::VoteBuying => "vote_buying",
            Self::BallotStuffing => "ballot_stuffing",
            Self::Intimidation => "intimidation",
            Self::Tampering => "tampering",
            Self::Misinformation => "misinformation",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IncidentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "votebuying" => Ok(Self::VoteBuying),
            "ballotstuffing" => Ok(Self::BallotStuffing),
            "intimidation" => Ok(Self::Intimidation),
            "tampering" => Ok(Self::Tampering),
            "misinformation" => Ok(Self::Misinformation),
            "other" => Ok(Self::Other),
            _ => Err(format!("unknown incident type: {s:?}")),
        }
    }
}

impl Serialize for IncidentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for IncidentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Severity
// ============================================================================

pub const MIN_SEVERITY: u8 = 1;
pub const MAX_SEVERITY: u8 = 5;

/// Incident severity, 1 (minor) to 5 (critical) inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Severity(u8);

impl Severity {
    pub fn new(value: i64) -> Result<Self, String> {
        if (MIN_SEVERITY as i64..=MAX_SEVERITY as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(format!(
                "severity must be between {MIN_SEVERITY} and {MAX_SEVERITY}, got {value}"
            ))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| format!("severity must be an integer, got {s:?}"))?;
        Self::new(value)
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

/// Accepts `3` and `"3"`; records written by the web form carry strings.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(v) => Severity::new(v),
            Raw::Float(v) if v.fract() == 0.0 => Severity::new(v as i64),
            Raw::Float(v) => Err(format!("severity must be an integer, got {v}")),
            Raw::Text(s) => s.parse(),
        }
        .map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Location
// ============================================================================

/// WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }

    /// Parse `"<lat>, <lon>"` free text. Returns `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let (lat, lon) = text.split_once(',')?;
        let latitude: f64 = lat.trim().parse().ok()?;
        let longitude: f64 = lon.trim().parse().ok()?;
        Self::new(latitude, longitude)
    }

    /// Grid cell key used for hotspot aggregation (0.01 degree cells).
    pub fn grid_cell(&self) -> (i64, i64) {
        (
            (self.latitude * 100.0).round() as i64,
            (self.longitude * 100.0).round() as i64,
        )
    }
}

// ============================================================================
// Wallet address
// ============================================================================

/// Wallet address normalized for ledger lookups (trimmed, lowercase).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_lowercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Content address
// ============================================================================

/// Content identifier returned by the pinning provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("content address is empty".to_string());
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("content address is not alphanumeric: {trimmed:?}"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Local address for a SHA-256 digest, used by the in-process pin store.
    pub fn from_sha256(digest: &[u8]) -> Self {
        Self(format!("bafk{}", hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
