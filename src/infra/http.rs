//! Shared plumbing for outbound provider requests.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use super::{RelayError, Result};

/// Default outbound request timeout.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("incident-relay/", env!("CARGO_PKG_VERSION"));

/// Longest provider error body kept in logs and error messages.
const MAX_ERROR_BODY: usize = 512;

/// Build an HTTP client with the request timeout applied to every call.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| RelayError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Turn a non-success response into [`RelayError::Upstream`], keeping a
/// truncated copy of the provider's body.
pub async fn ensure_success(provider: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(RelayError::upstream(provider, Some(status.as_u16()), body))
}

/// Decode a JSON response body.
pub async fn decode_json<T: DeserializeOwned>(provider: &'static str, response: Response) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| RelayError::from_reqwest(provider, e))?;
    serde_json::from_slice(&bytes).map_err(|e| RelayError::Decode(format!("{provider}: {e}")))
}

/// Read an env var, treating empty strings as unset.
pub fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Strip trailing slashes so paths can be appended with `format!`.
pub fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
