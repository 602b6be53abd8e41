//! API key authentication.

use axum::http::{HeaderMap, HeaderValue};

use crate::config::Credential;

/// Header carrying the caller's API key.
pub const X_API_KEY: &str = "x-api-key";

/// Why a caller was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No key, or a key that is not a visible-ASCII string.
    Missing,
    /// A key that does not match the configured secret.
    Invalid,
}

impl AuthRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthRejection::Missing => "missing",
            AuthRejection::Invalid => "invalid",
        }
    }
}

/// Validates `x-api-key` against the single shared secret.
#[derive(Clone)]
pub struct ApiKeyAuth {
    secret: Credential,
}

impl ApiKeyAuth {
    pub fn new(secret: Credential) -> Self {
        Self { secret }
    }

    /// Check the raw header value, if any.
    pub fn authenticate(&self, provided: Option<&HeaderValue>) -> Result<(), AuthRejection> {
        let key = provided
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthRejection::Missing)?;

        if key.is_empty() {
            return Err(AuthRejection::Missing);
        }

        if constant_time_eq(key.as_bytes(), self.secret.expose().as_bytes()) {
            Ok(())
        } else {
            Err(AuthRejection::Invalid)
        }
    }

    /// Check the key carried by request headers.
    ///
    /// More than one `x-api-key` header is refused as invalid, whatever the
    /// individual values are.
    pub fn authenticate_headers(&self, headers: &HeaderMap) -> Result<(), AuthRejection> {
        let mut values = headers.get_all(X_API_KEY).iter();
        let first = values.next();
        if values.next().is_some() {
            return Err(AuthRejection::Invalid);
        }
        self.authenticate(first)
    }
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
