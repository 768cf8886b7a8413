//! App backend HTTP surface.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use strand_core::StrandError;
use strand_crypto::AuthenticatedMessage;

use crate::actions::AppBackend;
use crate::error::ApiError;

pub fn build_router(backend: Arc<AppBackend>, allowed_origins: &[String]) -> Router {
    let cors = cors_layer(allowed_origins);

    Router::new()
        .route("/api/v1/app/:app_key/config", post(update_config).get(get_config))
        .route("/api/v1/app/:app_key/session", post(register_session))
        .route("/api/v1/app/:app_key/:action", post(invoke_action))
        .route("/api/v1/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(backend)
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

fn origin_of(headers: &HeaderMap) -> Option<String> {
    headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()).map(str::to_string)
}

/// Parse the request body as an `AuthenticatedMessage`, keeping the raw
/// value for downstream forwarding.
fn parse_signed_body(body: &Value) -> Result<AuthenticatedMessage, StrandError> {
    serde_json::from_value(body.clone()).map_err(|_| {
        StrandError::ValidationFailed("body must be an AuthenticatedMessage".into())
    })
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn get_config(
    State(backend): State<Arc<AppBackend>>,
    Path(app_key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let config = backend
        .load_config(&app_key)
        .await?
        .ok_or_else(|| StrandError::NotFound(format!("no app config for {app_key}")))?;
    Ok(Json(json!({ "success": true, "config": config })))
}

async fn update_config(
    State(backend): State<Arc<AppBackend>>,
    Path(app_key): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let msg = parse_signed_body(&body)?;
    let config = backend.update_config(&app_key, &msg).await?;
    Ok(Json(json!({ "success": true, "config": config })))
}

async fn register_session(
    State(backend): State<Arc<AppBackend>>,
    Path(app_key): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let msg = parse_signed_body(&body)?;
    let outcome = backend
        .register_session(&app_key, origin_of(&headers).as_deref(), &msg, body)
        .await?;
    Ok(Json(json!({ "success": outcome.result.accepted, "uri": outcome.uri, "result": outcome.result })))
}

async fn invoke_action(
    State(backend): State<Arc<AppBackend>>,
    Path((app_key, action)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let msg = parse_signed_body(&body)?;
    let outcome = backend
        .invoke_action(&app_key, &action, origin_of(&headers).as_deref(), &msg, body)
        .await?;
    Ok(Json(json!({ "success": outcome.result.accepted, "uri": outcome.uri, "result": outcome.result })))
}

async fn health(State(backend): State<Arc<AppBackend>>) -> Json<Value> {
    Json(backend.health().await)
}
