//! Wallet HTTP surface.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use strand_core::StrandError;

use crate::error::ApiError;
use crate::server::{CredentialRequest, LoginRequest, ProxyWriteRequest, WalletServer};

pub fn build_router(server: Arc<WalletServer>, allowed_origins: &[String]) -> Router {
    let cors = cors_layer(allowed_origins);

    Router::new()
        .route("/api/v1/auth/signup/:app_key", post(signup))
        .route("/api/v1/auth/login/:app_key", post(login))
        .route("/api/v1/auth/change-password", post(change_password))
        .route("/api/v1/auth/request-reset", post(request_reset))
        .route("/api/v1/auth/reset", post(reset))
        .route("/api/v1/proxy/write", post(proxy_write))
        .route("/api/v1/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> =
            allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    }
}

/// Pull the authenticated username out of the bearer token.
fn authenticate(server: &WalletServer, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| StrandError::Unauthorized("missing bearer token".into()))?;
    Ok(server.verify_token(token)?.username)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn signup(
    State(server): State<Arc<WalletServer>>,
    Path(app_key): Path<String>,
    Json(body): Json<CredentialRequest>,
) -> Result<Json<Value>, ApiError> {
    let auth = server.signup(&app_key, body).await?;
    Ok(Json(json!({ "success": true, "token": auth.token, "username": auth.username })))
}

async fn login(
    State(server): State<Arc<WalletServer>>,
    Path(app_key): Path<String>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let auth = server.login(&app_key, body).await?;
    Ok(Json(json!({ "success": true, "token": auth.token, "username": auth.username })))
}

#[derive(Deserialize)]
struct ChangePasswordBody {
    #[serde(rename = "oldPassword")]
    old_password: String,
    #[serde(rename = "newPassword")]
    new_password: String,
}

async fn change_password(
    State(server): State<Arc<WalletServer>>,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordBody>,
) -> Result<Json<Value>, ApiError> {
    let username = authenticate(&server, &headers)?;
    server.change_password(&username, &body.old_password, &body.new_password).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
struct RequestResetBody {
    username: String,
}

async fn request_reset(
    State(server): State<Arc<WalletServer>>,
    Json(body): Json<RequestResetBody>,
) -> Result<Json<Value>, ApiError> {
    let reset = server.request_reset(&body.username).await?;
    Ok(Json(json!({ "success": true, "token": reset.token, "expiresAt": reset.expires_at })))
}

#[derive(Deserialize)]
struct ResetBody {
    token: String,
    #[serde(rename = "newPassword")]
    new_password: String,
}

async fn reset(
    State(server): State<Arc<WalletServer>>,
    Json(body): Json<ResetBody>,
) -> Result<Json<Value>, ApiError> {
    let auth = server.reset_with_token(&body.token, &body.new_password).await?;
    Ok(Json(json!({ "success": true, "token": auth.token, "username": auth.username })))
}

async fn proxy_write(
    State(server): State<Arc<WalletServer>>,
    headers: HeaderMap,
    Json(body): Json<ProxyWriteRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = authenticate(&server, &headers)?;
    let written = server.proxy_write(&username, body).await?;
    Ok(Json(json!({ "success": true, "uri": written.uri, "result": written.result })))
}

async fn health(State(server): State<Arc<WalletServer>>) -> Json<Value> {
    Json(server.health().await)
}
