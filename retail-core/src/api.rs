//! API gateway client.
//!
//! Every call resolves to an [`ApiResponse`]; nothing raises across this
//! boundary. Requests carry the current bearer token, and a 401 from the
//! backend tears the session down through the [`CredentialVault`] before the
//! caller sees the failure.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::credentials::CredentialVault;
use crate::models::{Credentials, Registration, UserProfile};

pub const GENERIC_ERROR: &str = "An unexpected error occurred";

/// Uniform result of a backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T = Value> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// HTTP status, when a response was received at all.
    pub status: Option<u16>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, status: u16) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status: Some(status),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            status: None,
        }
    }

    pub fn error_or(&self, fallback: &str) -> String {
        self.error.clone().unwrap_or_else(|| fallback.to_string())
    }
}

impl ApiResponse<Value> {
    /// Decode the payload into `T`. A payload that does not match turns the
    /// response into a failure.
    pub fn decode<T: DeserializeOwned>(self) -> ApiResponse<T> {
        let ApiResponse {
            success,
            data,
            error,
            status,
        } = self;

        if !success {
            return ApiResponse {
                success,
                data: None,
                error,
                status,
            };
        }

        match serde_json::from_value::<T>(data.unwrap_or(Value::Null)) {
            Ok(decoded) => ApiResponse {
                success: true,
                data: Some(decoded),
                error: None,
                status,
            },
            Err(e) => {
                let err = ApiError::Malformed(e.to_string());
                tracing::warn!(error = %err, "Response payload did not decode");
                ApiResponse {
                    success: false,
                    data: None,
                    error: Some(err.to_string()),
                    status,
                }
            }
        }
    }
}

/// Failures inside the gateway. Callers only see their message text.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request failed with status code {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// One entry of a [`ApiClient::batch`] call.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl BatchRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }
}

// ============================================================================
// ApiClient
// ============================================================================

pub struct ApiClient {
    client: Client,
    base_url: String,
    vault: Arc<CredentialVault>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, vault: Arc<CredentialVault>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            vault,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn vault(&self) -> &Arc<CredentialVault> {
        &self.vault
    }

    pub fn is_authenticated(&self) -> bool {
        self.vault.token().is_some()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.vault.current().map(|s| s.profile().clone())
    }

    pub async fn get(&self, path: &str) -> ApiResponse {
        self.request(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> ApiResponse {
        self.request_with(Method::POST, path, body).await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> ApiResponse {
        self.request_with(Method::PUT, path, body).await
    }

    pub async fn patch<B: Serialize>(&self, path: &str, body: &B) -> ApiResponse {
        self.request_with(Method::PATCH, path, body).await
    }

    pub async fn delete(&self, path: &str) -> ApiResponse {
        self.request(Method::DELETE, path, None).await
    }

    async fn request_with<B: Serialize>(&self, method: Method, path: &str, body: &B) -> ApiResponse {
        match serde_json::to_value(body) {
            Ok(value) => self.request(method, path, Some(value)).await,
            Err(e) => {
                tracing::error!(error = %e, path = %path, "Failed to serialize request body");
                ApiResponse::failure(GENERIC_ERROR)
            }
        }
    }

    /// Send one request and fold every outcome into an `ApiResponse`.
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> ApiResponse {
        let url = format!("{}{}", self.base_url, path);
        let start = Instant::now();

        let mut builder = self.client.request(method.clone(), &url);
        if let Some(token) = self.vault.token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %method, url = %url, "API request");

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                let err = ApiError::Transport(e);
                tracing::error!(
                    method = %method,
                    url = %url,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    error = %err,
                    "API transport error"
                );
                return ApiResponse::failure(err.to_string());
            }
        };

        let status = response.status();
        let raw = match response.text().await {
            Ok(raw) => raw,
            Err(e) => {
                let err = ApiError::Transport(e);
                tracing::error!(
                    method = %method,
                    url = %url,
                    status = status.as_u16(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    error = %err,
                    "Failed to read API response body"
                );
                if status.is_success() {
                    return ApiResponse {
                        success: false,
                        data: None,
                        error: Some(err.to_string()),
                        status: Some(status.as_u16()),
                    };
                }
                // Error statuses still go through teardown below, without a body.
                String::new()
            }
        };
        let payload: Option<Value> = if raw.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&raw).ok()
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if status.is_success() {
            tracing::info!(method = %method, url = %url, status = status.as_u16(), elapsed_ms, "API response");
            return match payload {
                Some(data) => ApiResponse::ok(data, status.as_u16()),
                None if raw.trim().is_empty() => ApiResponse::ok(Value::Null, status.as_u16()),
                None => ApiResponse {
                    success: false,
                    data: None,
                    error: Some(ApiError::Malformed("body is not JSON".to_string()).to_string()),
                    status: Some(status.as_u16()),
                },
            };
        }

        tracing::error!(method = %method, url = %url, status = status.as_u16(), elapsed_ms, "API error response");
        self.handle_error_status(status, path);

        let message = payload
            .as_ref()
            .and_then(backend_message)
            .unwrap_or_else(|| ApiError::Status(status.as_u16()).to_string());

        ApiResponse {
            success: false,
            data: payload,
            error: Some(message),
            status: Some(status.as_u16()),
        }
    }

    fn handle_error_status(&self, status: StatusCode, path: &str) {
        if status == StatusCode::UNAUTHORIZED {
            self.vault.invalidate(format!("401 Unauthorized from {}", path));
        } else if status == StatusCode::FORBIDDEN {
            tracing::warn!(path = %path, "Access forbidden - insufficient permissions");
        } else if status.is_server_error() {
            tracing::error!(path = %path, status = status.as_u16(), "Server error - please try again later");
        }
    }

    /// Run every request concurrently; one result per request, in input order.
    /// A failing request never fails its siblings.
    pub async fn batch(&self, requests: Vec<BatchRequest>) -> Vec<ApiResponse> {
        let calls = requests
            .into_iter()
            .map(|r| async move { self.request(r.method, &r.path, r.body).await });
        join_all(calls).await
    }

    // ------------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------------

    pub async fn login(&self, credentials: &Credentials) -> ApiResponse {
        self.post("/api/auth/login", credentials).await
    }

    pub async fn register(&self, registration: &Registration) -> ApiResponse {
        self.post("/api/auth/register", registration).await
    }

    pub async fn logout(&self) -> ApiResponse {
        self.request(Method::POST, "/api/auth/logout", None).await
    }

    pub async fn auth_status(&self) -> ApiResponse {
        self.get("/api/auth/status").await
    }

    // ------------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------------

    pub async fn health_check(&self) -> ApiResponse {
        self.get("/api/health").await
    }

    pub async fn services_health(&self) -> ApiResponse {
        self.get("/api/health/services").await
    }

    // ------------------------------------------------------------------------
    // Location services
    // ------------------------------------------------------------------------

    pub async fn track_location(&self, report: &TrackingReport) -> ApiResponse {
        self.post("/api/location/track", report).await
    }

    pub async fn nearby_retailers(&self, latitude: f64, longitude: f64, radius_km: Option<f64>) -> ApiResponse {
        let body = serde_json::json!({
            "latitude": latitude,
            "longitude": longitude,
            "radius_km": radius_km,
        });
        self.post("/api/location/nearby-retailers", &body).await
    }

    pub async fn local_trends(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: Option<f64>,
        days: Option<u32>,
    ) -> ApiResponse {
        let body = serde_json::json!({
            "latitude": latitude,
            "longitude": longitude,
            "radius_km": radius_km,
            "days": days,
        });
        self.post("/api/location/local-trends", &body).await
    }

    pub async fn location_promotions(&self, latitude: f64, longitude: f64) -> ApiResponse {
        let body = serde_json::json!({ "latitude": latitude, "longitude": longitude });
        self.post("/api/location/promotions", &body).await
    }

    pub async fn delivery_estimate(&self, retailer: (f64, f64), customer: (f64, f64)) -> ApiResponse {
        let body = serde_json::json!({
            "retailer_latitude": retailer.0,
            "retailer_longitude": retailer.1,
            "customer_latitude": customer.0,
            "customer_longitude": customer.1,
        });
        self.post("/api/location/delivery-estimate", &body).await
    }

    // ------------------------------------------------------------------------
    // Catalog and recommendations
    // ------------------------------------------------------------------------

    pub async fn featured_products(&self, limit: u32) -> ApiResponse {
        self.get(&format!("/api/products/featured?limit={}", limit)).await
    }

    pub async fn search_products(&self, query: &str, limit: u32) -> ApiResponse {
        let limit = limit.to_string();
        let path = match reqwest::Url::parse_with_params(
            "http://placeholder/api/products/search",
            &[("q", query), ("limit", limit.as_str())],
        ) {
            Ok(url) => format!("{}?{}", url.path(), url.query().unwrap_or_default()),
            Err(e) => return ApiResponse::failure(e.to_string()),
        };
        self.get(&path).await
    }

    pub async fn products_by_category(&self, category: &str, limit: u32) -> ApiResponse {
        self.get(&format!("/api/products/category/{}?limit={}", category, limit))
            .await
    }

    pub async fn product(&self, product_id: &str) -> ApiResponse {
        self.get(&format!("/api/products/{}", product_id)).await
    }

    pub async fn personalized_recommendations(
        &self,
        retailer_id: &str,
        coordinates: Option<(f64, f64)>,
        limit: u32,
    ) -> ApiResponse {
        let body = serde_json::json!({
            "retailer_id": retailer_id,
            "latitude": coordinates.map(|c| c.0),
            "longitude": coordinates.map(|c| c.1),
            "limit": limit,
        });
        self.post("/api/ai/recommendations/personalized", &body).await
    }

    pub async fn trending_recommendations(&self, limit: u32) -> ApiResponse {
        self.get(&format!("/api/ai/recommendations/trending?limit={}", limit))
            .await
    }

    pub async fn similar_products(&self, product_id: &str, limit: u32) -> ApiResponse {
        self.get(&format!(
            "/api/ai/recommendations/similar/{}?limit={}",
            product_id, limit
        ))
        .await
    }

    // ------------------------------------------------------------------------
    // Analytics
    // ------------------------------------------------------------------------

    pub async fn dashboard_analytics(&self) -> ApiResponse {
        self.get("/api/analytics/dashboard").await
    }

    pub async fn sales_forecast(&self, days_ahead: u32) -> ApiResponse {
        self.get(&format!("/api/analytics/sales-forecast?days={}", days_ahead))
            .await
    }
}

/// `POST /api/location/track` body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackingReport {
    pub retailer_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub activity: String,
}

/// Most specific message in an error body: `error`, then `message`.
fn backend_message(body: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
