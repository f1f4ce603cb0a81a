//! Trait definitions for the relay's external collaborators
//!
//! Every provider (pinning, gateway, proof verification, analysis,
//! geocoding) and the payment ledger sit behind one narrow trait so they can
//! be swapped for in-memory implementations and mocks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use crate::domain::{
    ContentAddress, Coordinates, MediaAttachment, MediaAuthenticity, MediaType,
    PaymentRecord, PinMetadata, PinnedContentReference, TextClassification, WalletAddress,
};

use super::Result;

/// A JSON document to pin together with its name and tags.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPin {
    pub name: String,
    pub content: Value,
    pub metadata: PinMetadata,
}

/// Receipt for a pinned object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinReceipt {
    pub cid: ContentAddress,
    pub size: Option<u64>,
}

/// Content-addressed storage with persistent retention.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PinningService: Send + Sync {
    /// Pin a binary file
    async fn pin_file(&self, file: MediaAttachment) -> Result<PinReceipt>;

    /// Pin a JSON document with name and key/value metadata
    async fn pin_json(&self, pin: JsonPin) -> Result<PinReceipt>;

    /// List every pinned object tagged with `project`
    async fn list_pins(&self, project: &str) -> Result<Vec<PinnedContentReference>>;
}

/// Read path for pinned content.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentGateway: Send + Sync {
    /// Fetch and decode a pinned JSON document
    async fn fetch_json(&self, cid: &ContentAddress) -> Result<Value>;
}

/// Append-only store of premium payments.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Append one record. Never overwrites existing records.
    async fn append(&self, record: PaymentRecord) -> Result<()>;

    /// All records for an address, oldest first
    async fn query_by_address(&self, address: &WalletAddress) -> Result<Vec<PaymentRecord>>;

    /// Whether a record with this transaction id already exists
    async fn transaction_seen(&self, transaction_id: &str) -> Result<bool>;

    /// Delete records whose window ended at or before `cutoff`, returning the count
    async fn prune_expired(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Count records whose window ended at or before `cutoff`
    async fn count_expired(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Assigns an incident category to free text.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<TextClassification>;
}

/// Source of media for an authenticity check.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    /// Publicly reachable URL
    Url(String),
    /// Bytes uploaded with the request
    Inline(MediaAttachment),
}

/// Detects synthetic or manipulated media.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MediaAuthenticityChecker: Send + Sync {
    async fn check(&self, media: MediaSource, media_type: MediaType) -> Result<MediaAuthenticity>;
}

/// Outcome of a proof-of-personhood check.
#[derive(Debug, Clone, PartialEq)]
pub struct ProofVerdict {
    pub verified: bool,
    /// Provider response body, passed through to the caller
    pub body: Value,
}

/// Proof-of-personhood verification.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    async fn verify(&self, proof: Value, action: &str) -> Result<ProofVerdict>;
}

/// Forward geocoding of free-text locations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>>;
}

