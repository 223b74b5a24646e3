//! Reverse geocoding: coordinates to a human-readable place.
//!
//! Enrichment is best-effort. The location store keeps the raw coordinates
//! whatever happens here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::GeocodingConfig;
use crate::models::Place;

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Geocoding API returned {0}")]
    Api(u16),

    #[error("All {attempts} geocoding attempts failed")]
    RetryExhausted { attempts: usize },
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Place, GeocodeError>;

    fn name(&self) -> &str;
}

/// Build the geocoder the configuration asks for.
pub fn create_geocoder(config: &GeocodingConfig) -> Result<Box<dyn ReverseGeocoder>, GeocodeError> {
    if config.enabled {
        Ok(Box::new(BigDataCloudGeocoder::new(config.clone())?))
    } else {
        Ok(Box::new(DisabledGeocoder))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReverseGeocodeResponse {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    locality: Option<String>,
    #[serde(default)]
    principal_subdivision: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<ReverseGeocodeResponse> for Place {
    fn from(r: ReverseGeocodeResponse) -> Self {
        Place {
            city: non_empty(r.city).or_else(|| non_empty(r.locality)),
            region: non_empty(r.principal_subdivision),
            country: non_empty(r.country_name),
        }
    }
}

/// Client for the BigDataCloud `reverse-geocode-client` endpoint.
#[derive(Debug, Clone)]
pub struct BigDataCloudGeocoder {
    client: Client,
    config: GeocodingConfig,
}

impl BigDataCloudGeocoder {
    pub fn new(config: GeocodingConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    async fn reverse_once(&self, latitude: f64, longitude: f64) -> Result<Place, GeocodeError> {
        let url = format!(
            "{}/reverse-geocode-client",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("localityLanguage", self.config.locality_language.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Reverse geocoding API error");
            return Err(GeocodeError::Api(status.as_u16()));
        }

        let body: ReverseGeocodeResponse = response.json().await?;
        Ok(body.into())
    }
}

#[async_trait]
impl ReverseGeocoder for BigDataCloudGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Place, GeocodeError> {
        let attempts = self.config.max_retries + 1;
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms.max(1))
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(self.config.max_retries);

        Retry::spawn(retry_strategy, || self.reverse_once(latitude, longitude))
            .await
            .map_err(|e| {
                tracing::warn!(attempts, error = %e, "Reverse geocoding failed");
                GeocodeError::RetryExhausted { attempts }
            })
    }

    fn name(&self) -> &str {
        "bigdatacloud"
    }
}

/// Enrichment switched off: every lookup yields an empty place.
pub struct DisabledGeocoder;

#[async_trait]
impl ReverseGeocoder for DisabledGeocoder {
    async fn reverse(&self, _latitude: f64, _longitude: f64) -> Result<Place, GeocodeError> {
        Ok(Place::default())
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
