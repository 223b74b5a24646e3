//! Demo backend HTTP API
//!
//! Axum server returning canned responses for the storefront client. Each
//! endpoint is a thin handler over an inner function that returns
//! `(StatusCode, body)` and can be tested without axum dispatch.
//!
//! Endpoints:
//! - GET  /api/health: liveness
//! - POST /api/auth/login: demo or registered credentials
//! - POST /api/auth/register: in-memory registration
//! - POST /api/auth/logout: revoke the presented token
//! - GET  /api/auth/status: bearer token check
//! - POST /api/location/track: location telemetry, authenticated
//! - GET  /api/products[/featured|/search|/category/:c|/:id]: canned catalog
//! - GET  /api/recommendations, /api/ai/recommendations/*: canned picks
//! - GET  /api/analytics[/dashboard]: canned dashboard figures
//! - POST /api/chat: scripted assistant
//!
//! Location services and sales forecasting are not served and return 404.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use retail_core::config::ShimConfig;
use retail_core::models::Registration;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::accounts::{AccountBook, RegisterOutcome};
use crate::catalog;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 50;

/// Shared state for all HTTP handlers
#[derive(Default)]
pub struct ShimState {
    pub accounts: AccountBook,
    pub environment: String,
}

impl ShimState {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            accounts: AccountBook::new(),
            environment: environment.into(),
        }
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<ShimState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/status", get(status_handler))
        .route("/api/location/track", post(track_handler))
        .route("/api/products", get(products_handler))
        .route("/api/products/featured", get(featured_handler))
        .route("/api/products/search", get(search_handler))
        .route("/api/products/category/:category", get(category_handler))
        .route("/api/products/:id", get(product_handler))
        .route("/api/recommendations", get(recommendations_handler))
        .route("/api/ai/recommendations/trending", get(recommendations_handler))
        .route(
            "/api/ai/recommendations/personalized",
            post(personalized_handler),
        )
        .route("/api/ai/recommendations/similar/:id", get(similar_handler))
        .route("/api/analytics", get(analytics_handler))
        .route("/api/analytics/dashboard", get(analytics_handler))
        .route("/api/chat", post(chat_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

/// Serve on an already-bound listener until the shutdown signal fires.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ShimState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shim server shutting down...");
        })
        .await?;
    Ok(())
}

pub async fn start_http_server(
    config: &ShimConfig,
    state: Arc<ShimState>,
    shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Retail demo backend listening on http://{}", addr);
    serve(listener, state, shutdown).await
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub retailer_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub activity: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PersonalizedRequest {
    pub retailer_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ChatRequest {
    pub message: Option<String>,
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

pub fn health_inner(environment: &str) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "environment": environment,
        }),
    )
}

pub fn login_inner(accounts: &AccountBook, req: LoginRequest) -> (StatusCode, serde_json::Value) {
    let email = req.email.unwrap_or_default();
    let password = req.password.unwrap_or_default();

    match accounts.login(&email, &password) {
        Some((token, user)) => {
            tracing::info!(user_id = %user.id, "Login succeeded");
            (
                StatusCode::OK,
                json!({
                    "success": true,
                    "user": user,
                    "token": token,
                }),
            )
        }
        None => (
            StatusCode::UNAUTHORIZED,
            json!({
                "success": false,
                "message": "Invalid credentials",
            }),
        ),
    }
}

pub fn register_inner(accounts: &AccountBook, req: RegisterRequest) -> (StatusCode, serde_json::Value) {
    let (name, email, password) = match (req.name, req.email, req.password) {
        (Some(n), Some(e), Some(p))
            if !n.trim().is_empty() && e.contains('@') && !p.is_empty() =>
        {
            (n, e, p)
        }
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                json!({
                    "success": false,
                    "message": "name, email and password are required",
                }),
            );
        }
    };

    let registration = Registration {
        name,
        email,
        password,
        phone: req.phone,
    };

    match accounts.register(registration) {
        RegisterOutcome::Created(user) => (
            StatusCode::CREATED,
            json!({
                "success": true,
                "user": user,
            }),
        ),
        RegisterOutcome::EmailTaken => (
            StatusCode::CONFLICT,
            json!({
                "success": false,
                "message": "Email already registered",
            }),
        ),
    }
}

pub fn logout_inner(accounts: &AccountBook, token: Option<&str>) -> (StatusCode, serde_json::Value) {
    if let Some(token) = token {
        accounts.revoke(token);
    }
    (StatusCode::OK, json!({ "success": true }))
}

pub fn status_inner(accounts: &AccountBook, token: Option<&str>) -> (StatusCode, serde_json::Value) {
    match token.and_then(|t| accounts.profile_for_token(t)) {
        Some(user) => (
            StatusCode::OK,
            json!({
                "authenticated": true,
                "user": user,
            }),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            json!({
                "authenticated": false,
                "user": null,
            }),
        ),
    }
}

pub fn track_inner(
    accounts: &AccountBook,
    token: Option<&str>,
    req: TrackRequest,
) -> (StatusCode, serde_json::Value) {
    let Some(user) = token.and_then(|t| accounts.profile_for_token(t)) else {
        return (
            StatusCode::UNAUTHORIZED,
            json!({
                "success": false,
                "message": "Authentication required",
            }),
        );
    };

    if !(-90.0..=90.0).contains(&req.latitude) || !(-180.0..=180.0).contains(&req.longitude) {
        return (
            StatusCode::BAD_REQUEST,
            json!({
                "success": false,
                "message": "latitude/longitude out of range",
            }),
        );
    }

    let retailer_id = req
        .retailer_id
        .unwrap_or_else(|| user.retailer_id.clone().unwrap_or(user.id.clone()));
    let activity = req.activity.unwrap_or_else(|| "browse".to_string());

    tracing::info!(
        retailer_id = %retailer_id,
        latitude = req.latitude,
        longitude = req.longitude,
        activity = %activity,
        "Location tracked"
    );

    (
        StatusCode::OK,
        json!({
            "success": true,
            "tracked": {
                "retailer_id": retailer_id,
                "latitude": req.latitude,
                "longitude": req.longitude,
                "activity": activity,
                "tracked_at": chrono::Utc::now().to_rfc3339(),
            },
        }),
    )
}

pub fn products_inner(products: Vec<&catalog::Product>) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        json!({
            "success": true,
            "total": products.len(),
            "products": products,
        }),
    )
}

pub fn product_inner(id: &str) -> (StatusCode, serde_json::Value) {
    match catalog::product(id) {
        Some(product) => (
            StatusCode::OK,
            json!({
                "success": true,
                "product": product,
            }),
        ),
        None => (
            StatusCode::NOT_FOUND,
            json!({
                "success": false,
                "message": "Product not found",
            }),
        ),
    }
}

pub fn similar_inner(id: &str, limit: usize) -> (StatusCode, serde_json::Value) {
    match catalog::similar(id, limit) {
        Some(products) => products_inner(products),
        None => product_inner(id),
    }
}

pub fn recommendations_inner(limit: usize) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        json!({
            "success": true,
            "recommendations": catalog::recommendations(limit),
        }),
    )
}

pub fn chat_inner(req: ChatRequest) -> (StatusCode, serde_json::Value) {
    let Some(message) = req.message.filter(|m| !m.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            json!({
                "success": false,
                "message": "message is required",
            }),
        );
    };

    (
        StatusCode::OK,
        json!({
            "success": true,
            "response": catalog::chat_reply(&message),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }),
    )
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

pub async fn health_handler(State(state): State<Arc<ShimState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.environment);
    (status, Json(body))
}

pub async fn login_handler(
    State(state): State<Arc<ShimState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let (status, body) = login_inner(&state.accounts, req);
    (status, Json(body))
}

pub async fn register_handler(
    State(state): State<Arc<ShimState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let (status, body) = register_inner(&state.accounts, req);
    (status, Json(body))
}

pub async fn logout_handler(
    State(state): State<Arc<ShimState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let (status, body) = logout_inner(&state.accounts, bearer_token(&headers));
    (status, Json(body))
}

pub async fn status_handler(
    State(state): State<Arc<ShimState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let (status, body) = status_inner(&state.accounts, bearer_token(&headers));
    (status, Json(body))
}

pub async fn track_handler(
    State(state): State<Arc<ShimState>>,
    headers: HeaderMap,
    Json(req): Json<TrackRequest>,
) -> impl IntoResponse {
    let (status, body) = track_inner(&state.accounts, bearer_token(&headers), req);
    (status, Json(body))
}

pub async fn products_handler(Query(q): Query<LimitQuery>) -> impl IntoResponse {
    let products = catalog::PRODUCTS.iter().take(clamp_limit(q.limit)).collect();
    let (status, body) = products_inner(products);
    (status, Json(body))
}

pub async fn featured_handler(Query(q): Query<LimitQuery>) -> impl IntoResponse {
    let (status, body) = products_inner(catalog::featured(clamp_limit(q.limit)));
    (status, Json(body))
}

pub async fn search_handler(Query(q): Query<SearchQuery>) -> impl IntoResponse {
    let query = q.q.unwrap_or_default();
    let (status, body) = products_inner(catalog::search(&query, clamp_limit(q.limit)));
    (status, Json(body))
}

pub async fn category_handler(
    Path(category): Path<String>,
    Query(q): Query<LimitQuery>,
) -> impl IntoResponse {
    let (status, body) = products_inner(catalog::by_category(&category, clamp_limit(q.limit)));
    (status, Json(body))
}

pub async fn product_handler(Path(id): Path<String>) -> impl IntoResponse {
    let (status, body) = product_inner(&id);
    (status, Json(body))
}

pub async fn similar_handler(
    Path(id): Path<String>,
    Query(q): Query<LimitQuery>,
) -> impl IntoResponse {
    let (status, body) = similar_inner(&id, clamp_limit(q.limit));
    (status, Json(body))
}

pub async fn recommendations_handler(Query(q): Query<LimitQuery>) -> impl IntoResponse {
    let (status, body) = recommendations_inner(clamp_limit(q.limit));
    (status, Json(body))
}

pub async fn personalized_handler(Json(req): Json<PersonalizedRequest>) -> impl IntoResponse {
    tracing::debug!(retailer_id = ?req.retailer_id, "Personalized recommendations");
    let (status, body) = recommendations_inner(clamp_limit(req.limit));
    (status, Json(body))
}

pub async fn analytics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": catalog::analytics(),
        })),
    )
}

pub async fn chat_handler(Json(req): Json<ChatRequest>) -> impl IntoResponse {
    let (status, body) = chat_inner(req);
    (status, Json(body))
}

pub async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": "Not found",
        })),
    )
}

// ============================================================================
// Helpers
// ============================================================================

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ============================================================================
// Unit Tests
// ============================================================================
