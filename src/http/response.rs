//! Downstream response construction.
//!
//! # Responsibilities
//! - Commit the event-stream header set exactly once, before the first chunk
//! - Answer CORS preflight for the relay route
//!
//! # Design Decisions
//! - The builder only runs after the upstream accepted the stream, so no
//!   status-code failure can follow it
//! - Hop-by-hop and content headers from the upstream are never copied

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

pub const EVENT_STREAM: HeaderValue = HeaderValue::from_static("text/event-stream");
pub const NO_CACHE: HeaderValue = HeaderValue::from_static("no-cache");

/// Set the streaming header set on a response.
pub fn apply_stream_headers(headers: &mut HeaderMap) {
    headers.insert(header::CONTENT_TYPE, EVENT_STREAM);
    headers.insert(header::CACHE_CONTROL, NO_CACHE);
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    apply_cors_headers(headers);
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization"),
    );
}

/// Wrap a relay body in a committed 200 event-stream response.
pub fn stream_response(body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    apply_stream_headers(response.headers_mut());
    response
}

/// CORS preflight answer for the relay route.
pub fn preflight_response() -> Response {
    let mut headers = HeaderMap::new();
    apply_cors_headers(&mut headers);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    (StatusCode::NO_CONTENT, headers).into_response()
}
