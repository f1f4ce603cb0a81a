//! Pinata pinning API and IPFS gateway adapters.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::domain::{ContentAddress, MediaAttachment, PinnedContentReference};

use super::http::{build_client, decode_json, ensure_success, env_non_empty, trim_base_url};
use super::{ContentGateway, JsonPin, PinReceipt, PinningService, RelayError, Result};

pub const DEFAULT_PINATA_API_URL: &str = "https://api.pinata.cloud";
pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud/ipfs";

/// Page size used when walking `pinList`.
pub const PIN_LIST_PAGE_SIZE: usize = 1000;

const PROVIDER: &str = "pinata";
const GATEWAY: &str = "ipfs-gateway";

/// Pinata credentials and endpoint.
#[derive(Clone)]
pub struct PinataConfig {
    pub api_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for PinataConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinataConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PinataConfig {
    /// Returns `None` unless both `PINATA_API_KEY` and `PINATA_API_SECRET` are set.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let api_key = env_non_empty("PINATA_API_KEY")?;
        let api_secret = env_non_empty("PINATA_API_SECRET")?;
        let api_url = env_non_empty("PINATA_API_URL")
            .unwrap_or_else(|| DEFAULT_PINATA_API_URL.to_string());

        Some(Self {
            api_url: trim_base_url(&api_url),
            api_key,
            api_secret,
            timeout,
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
    #[serde(rename = "PinSize", default)]
    pin_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PinListResponse {
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    rows: Vec<PinListRow>,
}

#[derive(Debug, Deserialize)]
struct PinListRow {
    ipfs_pin_hash: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    date_pinned: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Option<PinListMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct PinListMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    keyvalues: Option<BTreeMap<String, Value>>,
}

impl PinListRow {
    fn into_reference(self) -> Option<PinnedContentReference> {
        let cid = ContentAddress::parse(&self.ipfs_pin_hash).ok()?;
        let metadata = self.metadata.unwrap_or_default();
        // Pinata returns keyvalues as arbitrary JSON; keep scalars as strings.
        let keyvalues = metadata
            .keyvalues
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| {
                let s = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, s)
            })
            .collect();

        Some(PinnedContentReference {
            cid,
            name: metadata.name,
            keyvalues,
            pinned_at: self.date_pinned,
            size: self.size,
        })
    }
}

fn pin_options() -> Value {
    json!({ "cidVersion": 1 })
}

// ============================================================================
// Pinning client
// ============================================================================

/// [`PinningService`] backed by the Pinata REST API.
pub struct PinataClient {
    client: Client,
    config: PinataConfig,
}

impl PinataClient {
    pub fn new(config: PinataConfig) -> Result<Self> {
        let client = build_client(config.timeout)?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("pinata_api_key", &self.config.api_key)
            .header("pinata_secret_api_key", &self.config.api_secret)
    }

    fn parse_receipt(response: PinResponse) -> Result<PinReceipt> {
        let cid = ContentAddress::parse(&response.ipfs_hash)
            .map_err(|e| RelayError::Decode(format!("{PROVIDER}: {e}")))?;
        Ok(PinReceipt {
            cid,
            size: response.pin_size,
        })
    }

    async fn list_page(&self, project: &str, offset: usize) -> Result<PinListResponse> {
        let keyvalues = json!({ "project": { "value": project, "op": "eq" } }).to_string();
        let request = self.client.get(self.url("data/pinList")).query(&[
            ("status", "pinned".to_string()),
            ("pageLimit", PIN_LIST_PAGE_SIZE.to_string()),
            ("pageOffset", offset.to_string()),
            ("metadata[keyvalues]", keyvalues),
        ]);

        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, response).await?;
        decode_json(PROVIDER, response).await
    }
}

#[async_trait]
impl PinningService for PinataClient {
    #[instrument(skip(self, file), fields(file_name = %file.file_name, bytes = file.len()))]
    async fn pin_file(&self, file: MediaAttachment) -> Result<PinReceipt> {
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| RelayError::validation("media", format!("invalid content type: {e}")))?;

        let form = multipart::Form::new()
            .part("file", part)
            .text(
                "pinataMetadata",
                json!({ "name": file.file_name }).to_string(),
            )
            .text("pinataOptions", pin_options().to_string());

        let response = self
            .authorized(self.client.post(self.url("pinning/pinFileToIPFS")))
            .multipart(form)
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, response).await?;
        let receipt = Self::parse_receipt(decode_json(PROVIDER, response).await?)?;

        debug!(cid = %receipt.cid, "Pinned file");
        Ok(receipt)
    }

    #[instrument(skip(self, pin), fields(name = %pin.name))]
    async fn pin_json(&self, pin: JsonPin) -> Result<PinReceipt> {
        let body = json!({
            "pinataContent": pin.content,
            "pinataMetadata": {
                "name": pin.name,
                "keyvalues": pin.metadata.to_keyvalues(),
            },
            "pinataOptions": pin_options(),
        });

        let response = self
            .authorized(self.client.post(self.url("pinning/pinJSONToIPFS")))
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, response).await?;
        let receipt = Self::parse_receipt(decode_json(PROVIDER, response).await?)?;

        debug!(cid = %receipt.cid, "Pinned JSON document");
        Ok(receipt)
    }

    #[instrument(skip(self))]
    async fn list_pins(&self, project: &str) -> Result<Vec<PinnedContentReference>> {
        let mut references = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.list_page(project, offset).await?;
            let rows = page.rows.len();
            references.extend(page.rows.into_iter().filter_map(PinListRow::into_reference));
            offset += rows;

            let exhausted = match page.count {
                Some(total) => offset >= total,
                None => rows < PIN_LIST_PAGE_SIZE,
            };
            if rows == 0 || exhausted {
                break;
            }
        }

        debug!(count = references.len(), "Listed pins");
        Ok(references)
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// [`ContentGateway`] reading through a public IPFS HTTP gateway.
pub struct IpfsGateway {
    client: Client,
    base_url: String,
}

impl IpfsGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: trim_base_url(base_url),
        })
    }

    pub fn from_env(timeout: Duration) -> Result<Self> {
        let base_url =
            env_non_empty("IPFS_GATEWAY_URL").unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());
        Self::new(&base_url, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ContentGateway for IpfsGateway {
    #[instrument(skip(self), fields(cid = %cid))]
    async fn fetch_json(&self, cid: &ContentAddress) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, cid);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(GATEWAY, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RelayError::NotFound(format!("content {cid}")));
        }

        let response = ensure_success(GATEWAY, response).await?;
        decode_json(GATEWAY, response).await
    }
}
