//! Response classification.
//!
//! # Responsibilities
//! - Turn an upstream outcome into the client-visible status, headers, body
//! - Apply the cache lifetime matching the outcome band
//! - Emit structured JSON for errors and the debug echo
//!
//! # Design Decisions
//! - Successful tiles are cacheable for an hour and may be served stale for a
//!   further day while a cache revalidates in the background
//! - Failures are never cacheable
//! - The gateway re-exposes public cartographic tiles, so CORS is wide open

use axum::{
    body::Body,
    http::{header, Response, StatusCode},
};
use serde::Serialize;

use crate::upstream::UpstreamResponse;

/// Cache policy for successful tile responses.
pub const CACHE_SUCCESS: &str = "public, max-age=3600, stale-while-revalidate=86400";
/// Cache policy for upstream failures passed through to the client.
pub const CACHE_FAILURE: &str = "no-store";
/// Cache policy for the debug echo.
pub const CACHE_DEBUG: &str = "public, max-age=60";

/// Debug-mode snippets are capped at this many body bytes.
const DEBUG_SNIPPET_BYTES: usize = 500;

/// Structured error body returned for 400 and 502 responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Debug echo of the upstream exchange.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DebugEcho<'a> {
    target_url: &'a str,
    status: u16,
    content_type: Option<&'a str>,
    body_snippet: String,
}

/// Pass the upstream outcome through, with the cache policy of its band.
pub fn tile_response(upstream: &UpstreamResponse) -> Response<Body> {
    let cache = if upstream.is_server_error() {
        CACHE_FAILURE
    } else {
        CACHE_SUCCESS
    };

    let mut builder = Response::builder()
        .status(StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY))
        .header(header::CACHE_CONTROL, cache);
    if let Some(content_type) = &upstream.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    finish(builder, Body::from(upstream.body.clone()))
}

/// Diagnostic echo of the upstream exchange, returned regardless of the
/// upstream status. The body is read as text even for binary tiles; a garbled
/// snippet is acceptable here.
pub fn debug_response(target_url: &str, upstream: &UpstreamResponse) -> Response<Body> {
    let snippet_len = upstream.body.len().min(DEBUG_SNIPPET_BYTES);
    let echo = DebugEcho {
        target_url,
        status: upstream.status,
        content_type: upstream.content_type.as_deref(),
        body_snippet: String::from_utf8_lossy(&upstream.body[..snippet_len]).into_owned(),
    };

    json_response(StatusCode::OK, Some(CACHE_DEBUG), &echo)
}

/// Client error for a request rejected before any upstream I/O.
pub fn validation_error(message: &str) -> Response<Body> {
    json_response(
        StatusCode::BAD_REQUEST,
        Some(CACHE_FAILURE),
        &ErrorBody {
            error: message,
            detail: None,
        },
    )
}

/// Hard failure: the upstream could not be reached at all.
pub fn upstream_unreachable(detail: String) -> Response<Body> {
    json_response(
        StatusCode::BAD_GATEWAY,
        None,
        &ErrorBody {
            error: "Upstream map service unreachable",
            detail: Some(detail),
        },
    )
}

fn json_response<T: Serialize>(
    status: StatusCode,
    cache: Option<&str>,
    body: &T,
) -> Response<Body> {
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cache) = cache {
        builder = builder.header(header::CACHE_CONTROL, cache);
    }

    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    finish(builder, Body::from(json))
}

/// Headers shared by every response path.
fn finish(builder: axum::http::response::Builder, body: Body) -> Response<Body> {
    builder
        .header(header::VARY, "Accept, Referer")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(body)
        .expect("static response headers are valid")
}
