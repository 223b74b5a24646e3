#![allow(dead_code)]

use std::sync::Arc;

use retail_core::config::{ApiConfig, LocationConfig, RetailConfig};
use retail_core::{
    DisabledGeocoder, FixedGeolocator, Geolocator, KeyValueStore, MemoryStore, ReverseGeocoder,
    Stores,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DEMO_EMAIL: &str = "demo@retailrecommend.com";
pub const DEMO_PASSWORD: &str = "demo123";
pub const DEMO_TOKEN: &str = "demo-jwt-token";

pub fn demo_user() -> serde_json::Value {
    json!({
        "id": "demo-user-1",
        "name": "Demo User",
        "email": DEMO_EMAIL,
        "avatar": null
    })
}

pub fn test_config(base_url: String) -> RetailConfig {
    RetailConfig {
        api: ApiConfig {
            base_url,
            timeout_secs: 5,
        },
        location: LocationConfig {
            tracking_interval_ms: 100,
            timeout_ms: 500,
            ..LocationConfig::default()
        },
        ..RetailConfig::default()
    }
}

pub fn build_stores(
    server: &MockServer,
    storage: Arc<dyn KeyValueStore>,
    geolocator: Arc<dyn Geolocator>,
) -> Stores {
    build_stores_with(test_config(server.uri()), storage, geolocator, Arc::new(DisabledGeocoder))
}

pub fn build_stores_with(
    config: RetailConfig,
    storage: Arc<dyn KeyValueStore>,
    geolocator: Arc<dyn Geolocator>,
    geocoder: Arc<dyn ReverseGeocoder>,
) -> Stores {
    Stores::with_geocoder(&config, storage, geolocator, geocoder).expect("Failed to build stores")
}

pub fn memory_storage() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryStore::new())
}

pub fn new_york() -> Arc<dyn Geolocator> {
    Arc::new(FixedGeolocator::new(40.7128, -74.0060, Some(15.0)))
}

pub async fn mount_demo_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "email": DEMO_EMAIL, "password": DEMO_PASSWORD })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "user": demo_user(),
            "token": DEMO_TOKEN
        })))
        .mount(server)
        .await;
}

pub async fn mount_status_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/auth/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authenticated": true,
            "user": demo_user()
        })))
        .mount(server)
        .await;
}

pub async fn mount_track_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/location/track"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(server)
        .await;
}

/// Number of requests the mock server has seen for `request_path`.
pub async fn hits(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}
