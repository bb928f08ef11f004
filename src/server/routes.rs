/// REST API routes.
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::cid::{ContentIdentifier, ValidationResult};
use crate::client::{guess_mime, RetrievalError, UploadFile, UploadResult};
use crate::error::StoreError;
use crate::gateway::ContentInfo;
use crate::ledger::StatsReport;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

// ─── Health ──────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    read_gateways: usize,
    write_gateway: String,
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let registry = state.client.registry();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        read_gateways: registry.ordered_read_gateways().len(),
        write_gateway: registry.write_gateway().base.clone(),
    })
}

pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

// ─── Content ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UploadQuery {
    #[serde(default)]
    name: String,
    mime_type: Option<String>,
    /// Declared size, used only when no body is sent.
    size: Option<u64>,
}

/// POST /api/upload?name=... — raw request body is the file content.
///
/// An empty body means no content was sent: the file is registered by name
/// and declared `size` alone, and a request with neither name nor body is
/// rejected with 422.
async fn upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResult>), ApiError> {
    let mut file = if body.is_empty() {
        let mime_type = guess_mime(&query.name);
        UploadFile::metadata_only(query.name, mime_type, query.size.unwrap_or(0))
    } else {
        UploadFile::new(query.name, body)
    };
    if let Some(mime_type) = query.mime_type {
        file.mime_type = mime_type;
    }

    match state.client.upload(&file, None).await {
        Ok(result) => Ok((StatusCode::CREATED, Json(result))),
        Err(e @ StoreError::HashDerivation(_)) => {
            Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct RetrieveQuery {
    file_name: Option<String>,
}

/// GET /api/retrieve/{cid} — content bytes, or the failed outcome as JSON.
async fn retrieve(
    State(state): State<Arc<AppState>>,
    Path(cid): Path<String>,
    Query(query): Query<RetrieveQuery>,
) -> Response {
    let identifier = ContentIdentifier::new(cid);
    let outcome = state
        .client
        .retrieve(&identifier, query.file_name.as_deref())
        .await;

    let status = match &outcome.error {
        None => StatusCode::OK,
        Some(RetrievalError::MalformedIdentifier { .. }) => StatusCode::BAD_REQUEST,
        Some(RetrievalError::AllGatewaysExhausted { .. }) => StatusCode::NOT_FOUND,
    };

    let Some(bytes) = outcome.bytes.clone().filter(|_| outcome.success) else {
        return (status, Json(outcome)).into_response();
    };

    let content_type = outcome
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    let mut resp = bytes.into_response();
    resp.headers_mut().insert(CONTENT_TYPE, content_type);
    if let Some(value) = outcome.file_name.as_deref().and_then(attachment_header) {
        resp.headers_mut().insert(CONTENT_DISPOSITION, value);
    }
    resp
}

/// `attachment; filename="<name>"`, with quotes and backslashes escaped.
/// Names carrying control characters get no header at all.
fn attachment_header(name: &str) -> Option<HeaderValue> {
    if name.is_empty() || name.chars().any(char::is_control) {
        return None;
    }
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    HeaderValue::from_str(&format!("attachment; filename=\"{escaped}\"")).ok()
}

/// GET /api/validate/{cid}
async fn validate(
    State(state): State<Arc<AppState>>,
    Path(cid): Path<String>,
) -> Json<ValidationResult> {
    Json(state.client.validate(&cid))
}

#[derive(Debug, Deserialize)]
struct UrlQuery {
    /// Index into the ordered read gateways.
    gateway: Option<usize>,
}

#[derive(Debug, Serialize)]
struct UrlResponse {
    url: String,
}

/// GET /api/url/{cid}?gateway=N
async fn url_for(
    State(state): State<Arc<AppState>>,
    Path(cid): Path<String>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<UrlResponse>, ApiError> {
    let identifier = ContentIdentifier::new(cid);
    let gateway = match query.gateway {
        Some(index) => Some(state.client.registry().read_gateway(index).ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("no read gateway at index {index}"),
            )
        })?),
        None => None,
    };

    Ok(Json(UrlResponse {
        url: state.client.url_for(&identifier, gateway),
    }))
}

/// GET /api/info/{cid} — HEAD request across gateways.
async fn info(
    State(state): State<Arc<AppState>>,
    Path(cid): Path<String>,
) -> Result<Json<ContentInfo>, ApiError> {
    let identifier = ContentIdentifier::new(cid);
    state
        .client
        .info(&identifier)
        .await
        .map(Json)
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("{identifier} not found on any gateway"),
            )
        })
}

pub fn content_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/upload", post(upload))
        .route("/api/retrieve/{cid}", get(retrieve))
        .route("/api/validate/{cid}", get(validate))
        .route("/api/url/{cid}", get(url_for))
        .route("/api/info/{cid}", get(info))
}

// ─── Stats ───────────────────────────────────────────────

/// GET /api/stats
async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsReport> {
    Json(state.client.stats().await)
}

pub fn stats_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/stats", get(stats))
}
