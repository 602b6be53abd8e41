//! Response rendering.
//!
//! # Responsibilities
//! - Serialize [`ProxyResponse`] as the JSON wire shape
//! - Set the HTTP status (upstream status on success)
//! - Attach `RateLimit-*` headers (limit, remaining, reset, policy) and
//!   `Retry-After` on 429
//! - Render body-read rejections as JSON too

use std::time::Duration;

use axum::extract::rejection::BytesRejection;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::forward::{FailureKind, ProxyResponse};
use crate::pipeline::PipelineOutcome;
use crate::security::rate_limit::RateLimitStatus;

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");
pub const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_json())).into_response()
    }
}

impl IntoResponse for PipelineOutcome {
    fn into_response(self) -> Response {
        let limited = self
            .response
            .failure()
            .is_some_and(|f| f.kind == FailureKind::RateLimited);

        let mut response = self.response.into_response();
        if let Some(status) = self.rate_limit {
            apply_rate_limit_headers(response.headers_mut(), &status, limited);
        }
        response
    }
}

/// Whole seconds until the window resets, rounded up.
pub fn reset_secs(reset_after: Duration) -> u64 {
    let secs = reset_after.as_secs();
    if reset_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, status: &RateLimitStatus, limited: bool) {
    let reset = HeaderValue::from(reset_secs(status.reset_after));
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(status.limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(status.remaining));
    headers.insert(RATELIMIT_RESET, reset.clone());
    let policy = format!("{};w={}", status.limit, status.window.as_secs());
    if let Ok(policy) = HeaderValue::from_str(&policy) {
        headers.insert(RATELIMIT_POLICY, policy);
    }
    if limited {
        headers.insert(axum::http::header::RETRY_AFTER, reset);
    }
}

/// JSON response for a body the server refused to buffer.
pub fn body_rejection(rejection: BytesRejection) -> Response {
    let status = rejection.status();
    let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "Request body too large"
    } else {
        "Failed to read request body"
    };
    (status, Json(json!({ "error": message }))).into_response()
}
