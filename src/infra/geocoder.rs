//! Nominatim forward geocoding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::domain::Coordinates;

use super::http::{build_client, decode_json, ensure_success, env_non_empty, trim_base_url};
use super::{Geocoder, RelayError, Result};

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

const PROVIDER: &str = "nominatim";

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl GeocoderConfig {
    /// Returns `None` unless `GEOCODER_ENABLED` is truthy.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let enabled = env_non_empty("GEOCODER_ENABLED")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        if !enabled {
            return None;
        }
        Some(Self {
            base_url: trim_base_url(
                &env_non_empty("NOMINATIM_URL").unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string()),
            ),
            timeout,
        })
    }
}

/// Nominatim returns coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl Place {
    fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::new(self.lat.parse().ok()?, self.lon.parse().ok()?)
    }
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: GeocoderConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            base_url: config.base_url,
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    #[instrument(skip(self))]
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("format", "json"), ("limit", "1"), ("q", query)])
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, response).await?;
        let places: Vec<Place> = decode_json(PROVIDER, response).await?;
        Ok(places.first().and_then(Place::coordinates))
    }
}
