//! Responses synthesized by the admission chain.
//!
//! # Design Decisions
//! - Rejections are ordinary responses, never errors surfaced to the host
//! - Bodies are small JSON documents naming the reason
//! - `Retry-After` is whole seconds, rounded up, at least 1

use axum::http::header::{HeaderValue, RETRY_AFTER};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct Rejection {
    error: &'static str,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
}

/// Seconds a throttled client should wait.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

/// 429 with a `Retry-After` hint.
pub fn rate_limited(retry_after: Duration) -> Response {
    let secs = retry_after_secs(retry_after);
    let body = Rejection {
        error: "rate_limit_exceeded",
        message: "Too many requests",
        retry_after_secs: Some(secs),
    };
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(secs));
    response
}

/// 403 for cross-origin requests refused outright.
pub fn origin_denied() -> Response {
    let body = Rejection {
        error: "origin_denied",
        message: "Cross-origin request not permitted",
        retry_after_secs: None,
    };
    (StatusCode::FORBIDDEN, Json(body)).into_response()
}
