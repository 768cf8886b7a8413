//! HTTP surface: the `/api/v1` route table over any backend.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use strand_core::{ListOptions, SortBy, SortOrder, Transaction};
use strand_store::{Backend, ExplorerBridge};

use crate::error::status_for_code;
use crate::ws::ws_handler;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    /// Read-only facade serving the GET routes (the contract viewers use).
    pub explorer: ExplorerBridge,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let explorer = ExplorerBridge::new(Arc::clone(&backend));
        Self { backend, explorer }
    }
}

/// Build the node router. `allowed_origins` follows the env convention:
/// empty or `*` means permissive.
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = cors_layer(allowed_origins);

    Router::new()
        .route("/api/v1/receive", post(receive))
        .route("/api/v1/write/:protocol/:domain", post(write_root))
        .route("/api/v1/write/:protocol/:domain/*path", post(write_path))
        .route("/api/v1/read/:protocol/:domain", get(read_root))
        .route("/api/v1/read/:protocol/:domain/*path", get(read_path))
        .route("/api/v1/list/:protocol/:domain", get(list_root))
        .route("/api/v1/list/:protocol/:domain/*path", get(list_path))
        .route("/api/v1/delete/:protocol/:domain", delete(delete_root))
        .route("/api/v1/delete/:protocol/:domain/*path", delete(delete_path))
        .route("/api/v1/health", get(health))
        .route("/api/v1/schema", get(schema))
        .route("/api/v1/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    }
}

fn join_uri(protocol: &str, domain: &str, path: Option<&str>) -> String {
    match path {
        Some(p) if !p.is_empty() => format!("{protocol}://{domain}/{p}"),
        _ => format!("{protocol}://{domain}"),
    }
}

// ── Receive / write ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ReceiveBody {
    tx: Transaction,
}

async fn receive(State(state): State<AppState>, Json(body): Json<ReceiveBody>) -> Response {
    let result = state.backend.receive(body.tx).await;
    let status = match (&result.accepted, &result.code) {
        (true, _) => StatusCode::OK,
        (false, Some(code)) => status_for_code(code),
        (false, None) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(result)).into_response()
}

#[derive(Deserialize)]
struct WriteBody {
    value: Value,
}

/// Legacy write shape: the server assembles the URI from the route.
async fn write_common(state: AppState, uri: String, body: WriteBody) -> Response {
    let result = state.backend.receive(Transaction::new(uri, body.value)).await;
    let status = match (&result.accepted, &result.code) {
        (true, _) => StatusCode::OK,
        (false, Some(code)) => status_for_code(code),
        (false, None) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(result)).into_response()
}

async fn write_root(
    State(state): State<AppState>,
    Path((protocol, domain)): Path<(String, String)>,
    Json(body): Json<WriteBody>,
) -> Response {
    write_common(state, join_uri(&protocol, &domain, None), body).await
}

async fn write_path(
    State(state): State<AppState>,
    Path((protocol, domain, path)): Path<(String, String, String)>,
    Json(body): Json<WriteBody>,
) -> Response {
    write_common(state, join_uri(&protocol, &domain, Some(&path)), body).await
}

// ── Read ─────────────────────────────────────────────────────────────────────

async fn read_common(state: AppState, uri: String) -> Response {
    let result = state.explorer.read(&uri).await;
    if result.success {
        // The record itself is the body: {ts, data}.
        (StatusCode::OK, Json(result.record)).into_response()
    } else {
        let status = result
            .code
            .as_deref()
            .map(status_for_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(result)).into_response()
    }
}

async fn read_root(
    State(state): State<AppState>,
    Path((protocol, domain)): Path<(String, String)>,
) -> Response {
    read_common(state, join_uri(&protocol, &domain, None)).await
}

async fn read_path(
    State(state): State<AppState>,
    Path((protocol, domain, path)): Path<(String, String, String)>,
) -> Response {
    read_common(state, join_uri(&protocol, &domain, Some(&path))).await
}

// ── List ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ListQuery {
    page: Option<usize>,
    limit: Option<usize>,
    pattern: Option<String>,
    sort_by: Option<SortBy>,
    sort_order: Option<SortOrder>,
}

impl ListQuery {
    fn into_options(self) -> ListOptions {
        let defaults = ListOptions::default();
        ListOptions {
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
            pattern: self.pattern,
            sort_by: self.sort_by.unwrap_or_default(),
            sort_order: self.sort_order.unwrap_or_default(),
        }
    }
}

async fn list_common(state: AppState, prefix: String, query: ListQuery) -> Response {
    let result = state.explorer.list(&prefix, query.into_options()).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        result
            .code
            .as_deref()
            .map(status_for_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    };
    (status, Json(result)).into_response()
}

async fn list_root(
    State(state): State<AppState>,
    Path((protocol, domain)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
) -> Response {
    list_common(state, join_uri(&protocol, &domain, None), query).await
}

async fn list_path(
    State(state): State<AppState>,
    Path((protocol, domain, path)): Path<(String, String, String)>,
    Query(query): Query<ListQuery>,
) -> Response {
    list_common(state, join_uri(&protocol, &domain, Some(&path)), query).await
}

// ── Delete ───────────────────────────────────────────────────────────────────

async fn delete_common(state: AppState, uri: String) -> Response {
    let result = state.backend.delete(&uri).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        result
            .code
            .as_deref()
            .map(status_for_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    };
    (status, Json(result)).into_response()
}

async fn delete_root(
    State(state): State<AppState>,
    Path((protocol, domain)): Path<(String, String)>,
) -> Response {
    delete_common(state, join_uri(&protocol, &domain, None)).await
}

async fn delete_path(
    State(state): State<AppState>,
    Path((protocol, domain, path)): Path<(String, String, String)>,
) -> Response {
    delete_common(state, join_uri(&protocol, &domain, Some(&path))).await
}

// ── Health / schema ──────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Response {
    Json(state.backend.health().await).into_response()
}

async fn schema(State(state): State<AppState>) -> Response {
    let keys = state.backend.program_keys().await;
    Json(json!({ "schema": keys })).into_response()
}
