//! Device geolocation seam.
//!
//! The platform reports failures with the three canonical position error
//! codes; the location store maps them to [`LocationError`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::LocationConfig;

/// Request parameters handed to the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    /// Upper bound on the acquisition, enforced by the platform.
    pub timeout: Duration,
    /// A cached OS fix younger than this may be returned instead of a fresh one.
    pub maximum_age: Duration,
}

impl From<&LocationConfig> for PositionOptions {
    fn from(config: &LocationConfig) -> Self {
        Self {
            high_accuracy: config.high_accuracy,
            timeout: Duration::from_millis(config.timeout_ms),
            maximum_age: Duration::from_millis(config.maximum_age_ms),
        }
    }
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self::from(&LocationConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionErrorCode {
    PermissionDenied = 1,
    PositionUnavailable = 2,
    Timeout = 3,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("position error {code:?}: {message}")]
pub struct PositionError {
    pub code: PositionErrorCode,
    pub message: String,
}

impl PositionError {
    pub fn new(code: PositionErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// User-facing location failures. Messages are stable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location access denied. Please enable location services.")]
    PermissionDenied,

    #[error("Location unavailable. Please try again.")]
    PositionUnavailable,

    #[error("Location request timed out. Please try again.")]
    Timeout,

    #[error("Geolocation is not supported by this platform")]
    Unsupported,
}

impl From<&PositionError> for LocationError {
    fn from(err: &PositionError) -> Self {
        match err.code {
            PositionErrorCode::PermissionDenied => LocationError::PermissionDenied,
            PositionErrorCode::PositionUnavailable => LocationError::PositionUnavailable,
            PositionErrorCode::Timeout => LocationError::Timeout,
        }
    }
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    fn is_supported(&self) -> bool {
        true
    }

    async fn current_position(&self, options: PositionOptions) -> Result<Position, PositionError>;
}

// ============================================================================
// Implementations
// ============================================================================

/// Returns a configured fix (optionally after a delay) or a configured error.
pub struct FixedGeolocator {
    outcome: Result<(f64, f64, Option<f64>), PositionError>,
    delay: Duration,
}

impl FixedGeolocator {
    pub fn new(latitude: f64, longitude: f64, accuracy: Option<f64>) -> Self {
        Self {
            outcome: Ok((latitude, longitude, accuracy)),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(code: PositionErrorCode) -> Self {
        Self {
            outcome: Err(PositionError::new(code, format!("{:?}", code))),
            delay: Duration::ZERO,
        }
    }

    /// Simulate a slow fix. Acquisitions slower than `options.timeout` fail with
    /// `PositionErrorCode::Timeout`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(&self, options: PositionOptions) -> Result<Position, PositionError> {
        let acquire = async {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcome.clone()
        };

        let (latitude, longitude, accuracy) = tokio::time::timeout(options.timeout, acquire)
            .await
            .map_err(|_| PositionError::new(PositionErrorCode::Timeout, "Timeout expired"))??;

        Ok(Position {
            latitude,
            longitude,
            accuracy,
            timestamp: Utc::now(),
        })
    }
}

/// A platform without any geolocation capability.
pub struct UnsupportedGeolocator;

#[async_trait]
impl Geolocator for UnsupportedGeolocator {
    fn is_supported(&self) -> bool {
        false
    }

    async fn current_position(&self, _options: PositionOptions) -> Result<Position, PositionError> {
        Err(PositionError::new(
            PositionErrorCode::PositionUnavailable,
            "geolocation unsupported",
        ))
    }
}
