//! On-demand cache invalidation.
//!
//! The CMS (or an operator) calls `POST /api/revalidate` after publishing.
//! Each named path is evicted from the render cache as a pattern, so the
//! next request for a matching page is fetched from the CMS again.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::routes::AppState;

/// Paths invalidated when a request names none: the listing and every post.
pub const DEFAULT_PATHS: [&str; 2] = ["/blog", "/blog/[slug]"];

/// Constant-time comparison against the configured secret.
pub fn token_matches(expected: &str, given: Option<&str>) -> bool {
    given.is_some_and(|given| bool::from(expected.as_bytes().ct_eq(given.as_bytes())))
}

#[derive(Debug, Default, Deserialize)]
pub struct RevalidateRequest {
    pub path: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RevalidateResponse {
    pub message: &'static str,
    pub revalidated: bool,
    pub paths: Vec<String>,
    /// Cached pages dropped by this request.
    pub evicted: usize,
    pub timestamp: String,
}

/// `POST /api/revalidate`. An empty body counts as `{}`.
pub async fn revalidate(State(state): State<AppState>, body: Bytes) -> Response {
    let request: RevalidateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RevalidateRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "malformed revalidation request");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "message": "Revalidation failed", "error": e.to_string() })),
                )
                    .into_response();
            }
        }
    };

    if let Some(expected) = state.config.revalidate_token() {
        if !token_matches(expected, request.token.as_deref()) {
            warn!("revalidation rejected: invalid token");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Invalid token" })),
            )
                .into_response();
        }
    }

    let paths: Vec<String> = match request.path.as_deref().map(str::trim) {
        Some(path) if !path.is_empty() => vec![path.to_string()],
        _ => DEFAULT_PATHS.iter().map(|p| p.to_string()).collect(),
    };
    let mut evicted = 0;
    for path in &paths {
        evicted += state.cache.invalidate(path).await;
    }
    info!(?paths, evicted, "revalidated");

    Json(RevalidateResponse {
        message: "Revalidation successful",
        revalidated: true,
        paths,
        evicted,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
    .into_response()
}

/// `GET /api/revalidate`: usage hint.
pub async fn usage() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Revalidation endpoint is working",
        "usage": "POST with { \"path\": \"/blog/[slug]\", \"token\": \"your-token\" }"
    }))
}
