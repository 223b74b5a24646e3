use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "RETAIL_API_URL";

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RetailConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub shim: ShimConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "~/.retail-recommend/state.json".to_string(),
        }
    }
}

impl StorageConfig {
    /// Storage path with a leading `~` expanded to the home directory.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).into_owned())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LocationConfig {
    pub validity_ms: u64,
    pub tracking_interval_ms: u64,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
    pub high_accuracy: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            validity_ms: 60 * 60 * 1000,
            tracking_interval_ms: 5 * 60 * 1000,
            timeout_ms: 10_000,
            maximum_age_ms: 5 * 60 * 1000,
            high_accuracy: true,
        }
    }
}

impl LocationConfig {
    pub fn validity(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.validity_ms as i64)
    }

    pub fn tracking_interval(&self) -> Duration {
        Duration::from_millis(self.tracking_interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeocodingConfig {
    pub enabled: bool,
    pub base_url: String,
    pub locality_language: String,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.bigdatacloud.net/data".to_string(),
            locality_language: "en".to_string(),
            max_retries: 2,
            retry_delay_ms: 200,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ShimConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl RetailConfig {
    /// Load from a TOML file (optional) layered with `RETAIL__SECTION__KEY`
    /// environment overrides. `RETAIL_API_URL` wins over both for the base URL.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("RETAIL")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("api.base_url", std::env::var(API_URL_ENV).ok())?
            .build()?;
        s.try_deserialize()
    }

    /// Parse a TOML document directly (no environment layering).
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(contents, config::FileFormat::Toml))
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = RetailConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:5000");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.location.validity_ms, 3_600_000);
        assert_eq!(config.location.tracking_interval(), Duration::from_secs(300));
        assert_eq!(config.location.timeout_ms, 10_000);
        assert_eq!(config.location.maximum_age_ms, 300_000);
        assert!(config.location.high_accuracy);
        assert_eq!(config.geocoding.locality_language, "en");
        assert_eq!(config.shim.port, 5000);
    }

    #[test]
    fn test_validity_window_is_one_hour_by_default() {
        let location = LocationConfig::default();
        assert_eq!(location.validity(), chrono::Duration::minutes(60));

        let short = LocationConfig {
            validity_ms: 250,
            ..LocationConfig::default()
        };
        assert_eq!(short.validity(), chrono::Duration::milliseconds(250));
    }

    #[test]
    fn test_partial_toml_keeps_defaults_for_missing_keys() {
        let config = RetailConfig::from_toml(
            r#"
            [api]
            base_url = "http://shop.internal:8080"

            [location]
            tracking_interval_ms = 60000
            "#,
        )
        .expect("parse");

        assert_eq!(config.api.base_url, "http://shop.internal:8080");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.location.tracking_interval(), Duration::from_secs(60));
        assert_eq!(config.location.validity_ms, 3_600_000);
        assert!(config.geocoding.enabled);
    }

    #[test]
    fn test_tilde_is_expanded_in_storage_path() {
        let storage = StorageConfig {
            path: "~/retail/state.json".to_string(),
        };
        let resolved = storage.resolved_path();
        assert!(!resolved.to_string_lossy().starts_with('~'));
        assert!(resolved.ends_with("retail/state.json"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = RetailConfig::load("/nonexistent/retail-config").expect("load");
        assert_eq!(config.location.validity_ms, 3_600_000);
    }
}
