use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Human-readable place resolved from coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

impl Place {
    pub fn is_empty(&self) -> bool {
        self.city.is_none() && self.region.is_none() && self.country.is_none()
    }
}

/// A geolocation fix, optionally enriched with a place, cached under
/// `user_location`. The capture time is stored as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, accuracy: Option<f64>, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            city: None,
            region: None,
            country: None,
            captured_at,
        }
    }

    pub fn enrich(&mut self, place: Place) {
        self.city = place.city;
        self.region = place.region;
        self.country = place.country;
    }

    /// Valid while strictly younger than `validity`; a sample exactly
    /// `validity` old is already expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>, validity: Duration) -> bool {
        now - self.captured_at < validity
    }

    pub fn expires_at(&self, validity: Duration) -> DateTime<Utc> {
        self.captured_at + validity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(t: DateTime<Utc>) -> LocationSample {
        LocationSample::new(40.7128, -74.0060, Some(12.0), t)
    }

    #[test]
    fn test_validity_window_boundaries() {
        let t = Utc::now();
        let sample = sample_at(t);
        let hour = Duration::hours(1);

        assert!(sample.is_valid_at(t + Duration::minutes(59), hour));
        assert!(!sample.is_valid_at(t + Duration::minutes(60), hour));
        assert!(!sample.is_valid_at(t + Duration::minutes(61), hour));
    }

    #[test]
    fn test_persisted_shape_uses_millisecond_timestamp() {
        let t = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let json = serde_json::to_value(sample_at(t)).unwrap();

        assert_eq!(json["timestamp"], 1_700_000_000_123i64);
        assert_eq!(json["latitude"], 40.7128);
        assert!(json.get("city").is_none());
    }

    #[test]
    fn test_enrich_copies_place() {
        let mut sample = sample_at(Utc::now());
        sample.enrich(Place {
            city: Some("New York".to_string()),
            region: Some("New York".to_string()),
            country: Some("United States".to_string()),
        });
        assert_eq!(sample.city.as_deref(), Some("New York"));
        assert_eq!(sample.country.as_deref(), Some("United States"));
    }
}
