//! Normalized outcome of one proxied call.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use serde_json::{json, Value};

pub const MSG_MISSING_URL: &str = "Missing required field: url";
pub const MSG_INVALID_BODY: &str = "Invalid request body";
pub const MSG_API_KEY_MISSING: &str = "API key missing";
pub const MSG_API_KEY_INVALID: &str = "Invalid API key";
pub const MSG_RATE_LIMITED: &str = "Rate limit exceeded";
pub const MSG_UPSTREAM_ERROR: &str = "Upstream API error";
pub const MSG_NO_RESPONSE: &str = "No response from upstream API";
pub const MSG_INTERNAL: &str = "Proxy internal error";

/// Error taxonomy for everything the proxy can refuse or fail at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    RateLimited,
    UpstreamError,
    NoResponse,
    Internal,
}

impl FailureKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::BadRequest => "bad_request",
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::Forbidden => "forbidden",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::UpstreamError => "upstream_error",
            FailureKind::NoResponse => "no_response",
            FailureKind::Internal => "internal",
        }
    }
}

/// A refused or failed call.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    pub status: StatusCode,
    pub message: &'static str,
    /// Body captured from an upstream that answered but then failed.
    pub upstream_body: Option<Value>,
    /// Short text of the underlying error.
    pub detail: Option<String>,
}

impl Failure {
    fn new(kind: FailureKind, status: StatusCode, message: &'static str) -> Self {
        Self {
            kind,
            status,
            message,
            upstream_body: None,
            detail: None,
        }
    }

    pub fn missing_url() -> Self {
        Self::new(FailureKind::BadRequest, StatusCode::BAD_REQUEST, MSG_MISSING_URL)
    }

    pub fn invalid_body(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::new(FailureKind::BadRequest, StatusCode::BAD_REQUEST, MSG_INVALID_BODY)
        }
    }

    pub fn api_key_missing() -> Self {
        Self::new(FailureKind::Unauthorized, StatusCode::UNAUTHORIZED, MSG_API_KEY_MISSING)
    }

    pub fn api_key_invalid() -> Self {
        Self::new(FailureKind::Forbidden, StatusCode::FORBIDDEN, MSG_API_KEY_INVALID)
    }

    pub fn rate_limited() -> Self {
        Self::new(FailureKind::RateLimited, StatusCode::TOO_MANY_REQUESTS, MSG_RATE_LIMITED)
    }

    pub fn upstream_error(status: StatusCode, body: Option<Value>) -> Self {
        Self {
            upstream_body: body,
            ..Self::new(FailureKind::UpstreamError, status, MSG_UPSTREAM_ERROR)
        }
    }

    pub fn no_response(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::new(FailureKind::NoResponse, StatusCode::BAD_GATEWAY, MSG_NO_RESPONSE)
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::new(FailureKind::Internal, StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL)
        }
    }

    fn to_json(&self) -> Value {
        match self.kind {
            FailureKind::UpstreamError => json!({
                "error": self.message,
                "data": self.upstream_body.clone().unwrap_or(Value::Null),
            }),
            _ => match &self.detail {
                Some(detail) => json!({ "error": self.message, "message": detail }),
                None => json!({ "error": self.message }),
            },
        }
    }
}

/// Exactly one of these is produced per inbound call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyResponse {
    Success {
        status: StatusCode,
        headers: BTreeMap<String, String>,
        body: Value,
    },
    Failure(Failure),
}

impl ProxyResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyResponse::Success { status, .. } => *status,
            ProxyResponse::Failure(f) => f.status,
        }
    }

    /// `"success"` or the failure kind label.
    pub fn outcome(&self) -> &'static str {
        match self {
            ProxyResponse::Success { .. } => "success",
            ProxyResponse::Failure(f) => f.kind.as_str(),
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            ProxyResponse::Success { .. } => None,
            ProxyResponse::Failure(f) => Some(f),
        }
    }

    /// The JSON document sent back to the caller.
    pub fn to_json(&self) -> Value {
        match self {
            ProxyResponse::Success {
                status,
                headers,
                body,
            } => json!({
                "status": status.as_u16(),
                "headers": headers,
                "data": body,
            }),
            ProxyResponse::Failure(f) => f.to_json(),
        }
    }
}

impl From<Failure> for ProxyResponse {
    fn from(failure: Failure) -> Self {
        ProxyResponse::Failure(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape() {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        let response = ProxyResponse::Success {
            status: StatusCode::CREATED,
            headers,
            body: json!({"ok": true}),
        };

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.to_json(),
            json!({
                "status": 201,
                "headers": {"content-type": "application/json"},
                "data": {"ok": true},
            })
        );
    }

    #[test]
    fn test_guard_failures_carry_only_error() {
        assert_eq!(
            ProxyResponse::from(Failure::missing_url()).to_json(),
            json!({"error": "Missing required field: url"})
        );
        assert_eq!(Failure::api_key_missing().status, StatusCode::UNAUTHORIZED);
        assert_eq!(Failure::api_key_invalid().status, StatusCode::FORBIDDEN);
        assert_eq!(
            ProxyResponse::from(Failure::rate_limited()).to_json(),
            json!({"error": "Rate limit exceeded"})
        );
    }

    #[test]
    fn test_upstream_error_relays_status_and_body() {
        let failure = Failure::upstream_error(StatusCode::SERVICE_UNAVAILABLE, Some(json!("partial")));
        let response = ProxyResponse::from(failure);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.outcome(), "upstream_error");
        assert_eq!(
            response.to_json(),
            json!({"error": "Upstream API error", "data": "partial"})
        );
    }

    #[test]
    fn test_network_failures_include_detail() {
        let response = ProxyResponse::from(Failure::no_response("connection refused"));
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response.to_json(),
            json!({"error": "No response from upstream API", "message": "connection refused"})
        );

        let response = ProxyResponse::from(Failure::internal("relative URL without a base"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.to_json()["error"], "Proxy internal error");
    }
}
