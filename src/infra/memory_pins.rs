//! In-process pin store for local development and tests.
//!
//! Implements both the pinning and gateway sides so a submitted record can be
//! read back without any network access. Content addresses are derived from
//! the SHA-256 of the stored bytes, so identical content pins to the same
//! address.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::domain::{ContentAddress, MediaAttachment, PinnedContentReference};

use super::{ContentGateway, JsonPin, PinReceipt, PinningService, RelayError, Result};

#[derive(Debug, Clone)]
struct StoredPin {
    name: Option<String>,
    keyvalues: BTreeMap<String, String>,
    bytes: Vec<u8>,
    pinned_at: DateTime<Utc>,
}

/// In-memory [`PinningService`] and [`ContentGateway`].
#[derive(Debug, Default)]
pub struct InMemoryPinStore {
    pins: RwLock<HashMap<ContentAddress, StoredPin>>,
}

impl InMemoryPinStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content address for `bytes`.
    pub fn address_for(bytes: &[u8]) -> ContentAddress {
        ContentAddress::from_sha256(&Sha256::digest(bytes))
    }

    pub async fn len(&self) -> usize {
        self.pins.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pins.read().await.is_empty()
    }

    /// Whether `cid` is currently pinned.
    pub async fn contains(&self, cid: &ContentAddress) -> bool {
        self.pins.read().await.contains_key(cid)
    }

    /// Raw stored bytes for `cid`.
    pub async fn bytes(&self, cid: &ContentAddress) -> Option<Vec<u8>> {
        self.pins.read().await.get(cid).map(|p| p.bytes.clone())
    }

    async fn insert(
        &self,
        bytes: Vec<u8>,
        name: Option<String>,
        keyvalues: BTreeMap<String, String>,
    ) -> PinReceipt {
        let cid = Self::address_for(&bytes);
        let size = bytes.len() as u64;
        let pin = StoredPin {
            name,
            keyvalues,
            bytes,
            pinned_at: Utc::now(),
        };
        self.pins.write().await.insert(cid.clone(), pin);
        PinReceipt {
            cid,
            size: Some(size),
        }
    }
}

#[async_trait]
impl PinningService for InMemoryPinStore {
    async fn pin_file(&self, file: MediaAttachment) -> Result<PinReceipt> {
        Ok(self
            .insert(file.bytes, Some(file.file_name), BTreeMap::new())
            .await)
    }

    async fn pin_json(&self, pin: JsonPin) -> Result<PinReceipt> {
        let bytes = serde_json::to_vec(&pin.content)
            .map_err(|e| RelayError::Internal(format!("failed to encode document: {e}")))?;
        Ok(self
            .insert(bytes, Some(pin.name), pin.metadata.to_keyvalues())
            .await)
    }

    async fn list_pins(&self, project: &str) -> Result<Vec<PinnedContentReference>> {
        let pins = self.pins.read().await;
        let mut references: Vec<PinnedContentReference> = pins
            .iter()
            .filter(|(_, pin)| pin.keyvalues.get("project").is_some_and(|p| p == project))
            .map(|(cid, pin)| PinnedContentReference {
                cid: cid.clone(),
                name: pin.name.clone(),
                keyvalues: pin.keyvalues.clone(),
                pinned_at: Some(pin.pinned_at),
                size: Some(pin.bytes.len() as u64),
            })
            .collect();
        references.sort_by(|a, b| b.pinned_at.cmp(&a.pinned_at).then_with(|| a.cid.cmp(&b.cid)));
        Ok(references)
    }
}

#[async_trait]
impl ContentGateway for InMemoryPinStore {
    async fn fetch_json(&self, cid: &ContentAddress) -> Result<Value> {
        let pins = self.pins.read().await;
        let pin = pins
            .get(cid)
            .ok_or_else(|| RelayError::NotFound(format!("content {cid}")))?;
        serde_json::from_slice(&pin.bytes).map_err(|e| RelayError::Decode(format!("{cid}: {e}")))
    }
}
