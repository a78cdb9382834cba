//! HTTP routes.
//!
//! ```text
//! GET  /                - Demo page
//! GET  /api/screenshot  - Service description
//! POST /api/screenshot  - Render HTML, respond with WebP bytes
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{error, info, warn};
use serde_json::json;

use crate::{async_api, Backend, Error, ScreenshotRequest};

pub const SERVICE_NAME: &str = "ScreenshotDONE";
pub const GENERIC_FAILURE: &str = "Failed to generate screenshot.";

/// Largest accepted request body. Inlined images easily push HTML past axum's 2 MB default.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const DEMO_PAGE: &str = include_str!("../static/index.html");

/// Shared handler state. Holds no per-request data.
pub struct AppState<B> {
    pub backend: Arc<B>,
    /// Wall-clock budget for one render
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl<B> AppState<B> {
    pub fn new(backend: Arc<B>, request_timeout: Duration) -> Self {
        Self { backend, request_timeout, max_body_bytes: MAX_BODY_BYTES }
    }

    pub fn with_body_limit(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            request_timeout: self.request_timeout,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// Error converted into the JSON error bodies of the API.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_client_error() {
            warn!("Rejected screenshot request: {}", self.0);
            let status = match self.0 {
                Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            let body = json!({ "error": self.0.to_string() });
            (status, Json(body)).into_response()
        } else {
            error!("Screenshot error: {}", self.0);
            let body = json!({
                "error": GENERIC_FAILURE,
                "details": self.0.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// Build the router for a backend.
pub fn create_router<B: Backend>(state: AppState<B>) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/", get(demo_page))
        .route("/api/screenshot", get(describe).post(screenshot::<B>))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn screenshot<B: Backend>(
    State(state): State<AppState<B>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = body.map_err(|rejection| body_error(rejection, state.max_body_bytes))?;

    // Validation happens before any browser is launched
    let request = ScreenshotRequest::from_json(&body)?;
    let (width, quality) = (request.width, request.quality);
    let started = Instant::now();

    let shot = async_api::render_with_timeout(state.backend.clone(), request, state.request_timeout).await?;

    info!(
        "Captured {} (width {}, quality {}): {} bytes in {:?}",
        shot.plan,
        width,
        quality,
        shot.data.len(),
        started.elapsed()
    );
    Ok(webp_response(shot.data))
}

fn body_error(rejection: BytesRejection, limit: usize) -> Error {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge(limit)
    } else {
        Error::InvalidRequest(rejection.body_text())
    }
}

fn webp_response(data: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/webp"),
            (header::CONTENT_DISPOSITION, "inline; filename=\"screenshot.webp\""),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        ],
        data,
    )
        .into_response()
}

async fn describe() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "endpoint": "POST /api/screenshot",
        "body": {
            "html": "(required) HTML string to render",
            "width": "(optional) viewport width in px, default 1280",
            "quality": "(optional) WebP quality 1-100, default 80",
        },
    }))
}

async fn demo_page() -> Html<&'static str> {
    Html(DEMO_PAGE)
}
