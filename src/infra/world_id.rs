//! World ID proof-of-personhood verification.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use super::http::{build_client, env_non_empty, trim_base_url};
use super::{ProofVerdict, ProofVerifier, RelayError, Result};

pub const DEFAULT_VERIFY_URL: &str = "https://developer.worldcoin.org/api/v1/verify";

const PROVIDER: &str = "world-id";

#[derive(Clone)]
pub struct WorldIdConfig {
    pub app_id: String,
    pub api_key: String,
    pub verify_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for WorldIdConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldIdConfig")
            .field("app_id", &self.app_id)
            .field("api_key", &"<redacted>")
            .field("verify_url", &self.verify_url)
            .finish()
    }
}

impl WorldIdConfig {
    /// Returns `None` unless both `WLD_APP_ID` and `WLD_API_KEY` are set.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let app_id = env_non_empty("WLD_APP_ID")?;
        let api_key = env_non_empty("WLD_API_KEY")?;
        let verify_url =
            env_non_empty("WLD_VERIFY_URL").unwrap_or_else(|| DEFAULT_VERIFY_URL.to_string());
        Some(Self {
            app_id,
            api_key,
            verify_url: trim_base_url(&verify_url),
            timeout,
        })
    }
}

/// Build the provider request body: the proof's fields plus `action`.
fn request_body(proof: Value, action: &str) -> Value {
    let mut body = match proof {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("proof".to_string(), other);
            map
        }
    };
    body.insert("action".to_string(), Value::String(action.to_string()));
    Value::Object(body)
}

/// [`ProofVerifier`] that forwards proofs to the World ID developer API.
pub struct WorldIdVerifier {
    client: Client,
    config: WorldIdConfig,
}

impl WorldIdVerifier {
    pub fn new(config: WorldIdConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            config,
        })
    }
}

#[async_trait]
impl ProofVerifier for WorldIdVerifier {
    #[instrument(skip(self, proof))]
    async fn verify(&self, proof: Value, action: &str) -> Result<ProofVerdict> {
        let url = format!("{}/{}", self.config.verify_url, self.config.app_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request_body(proof, action))
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(PROVIDER, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::from_reqwest(PROVIDER, e))?;
        // Provider errors carry a JSON body describing the rejection; keep it.
        let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        let verified = status.as_u16() == 200;
        if verified {
            info!(action, "Proof verified");
        } else {
            warn!(action, status = status.as_u16(), "Proof rejected");
        }
        Ok(ProofVerdict { verified, body })
    }
}
